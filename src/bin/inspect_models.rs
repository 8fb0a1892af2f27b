use ort::session::Session;
use rusty_jewels::AppConfig;
use std::path::Path;

fn inspect(label: &str, path: &str) -> anyhow::Result<()> {
    println!("\n=== {} ({}) ===", label, path);
    if !Path::new(path).exists() {
        println!("missing");
        return Ok(());
    }
    let session = Session::builder()?.with_intra_threads(1)?.commit_from_file(path)?;

    println!("--- Inputs ---");
    for (i, input) in session.inputs.iter().enumerate() {
        println!("#{}: {} ({:?})", i, input.name, input.input_type);
    }
    println!("--- Outputs ---");
    for (i, output) in session.outputs.iter().enumerate() {
        println!("#{}: {} ({:?})", i, output.name, output.output_type);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| rusty_jewels::config::DEFAULT_PATH.to_string());
    let config = AppConfig::load(Path::new(&config_path))?;

    inspect("Face detection", &config.models.face_detection_path)?;
    inspect("Face mesh", &config.models.face_mesh_path)?;
    inspect("Segmentation", &config.models.segmentation_path)?;
    Ok(())
}
