//! Thin helpers over `ort` shared by the detector and the segmenter.

use std::path::Path;

use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;

use crate::error::{Error, Result};

/// Builds an optimized CPU session for the model at `path`.
pub fn load_session(path: &Path, intra_threads: usize) -> Result<Session> {
    build_session(path, intra_threads).map_err(|e| Error::Model(format!("{}: {:#}", path.display(), e)))
}

fn build_session(path: &Path, intra_threads: usize) -> anyhow::Result<Session> {
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(intra_threads)?
        .commit_from_file(path)?;
    Ok(session)
}

/// Runs a single-input model and copies out its first output.
pub fn run_first(session: &mut Session, shape: &[i64], data: Vec<f32>) -> Result<Vec<f32>> {
    let run = || -> anyhow::Result<Vec<f32>> {
        let input = Tensor::from_array((shape.to_vec(), data))?;
        let outputs = session.run(ort::inputs![input])?;
        let (_shape, values) = outputs[0].try_extract_tensor::<f32>()?;
        Ok(values.to_vec())
    };
    run().map_err(|e| Error::Model(format!("{:#}", e)))
}

/// Runs a single-input model and copies out the named outputs, in order.
pub fn run_named(session: &mut Session, shape: &[i64], data: Vec<f32>, names: &[&str]) -> Result<Vec<Vec<f32>>> {
    let run = || -> anyhow::Result<Vec<Vec<f32>>> {
        let input = Tensor::from_array((shape.to_vec(), data))?;
        let outputs = session.run(ort::inputs![input])?;
        let mut all = Vec::with_capacity(names.len());
        for name in names {
            let (_shape, values) = outputs[*name].try_extract_tensor::<f32>()?;
            all.push(values.to_vec());
        }
        Ok(all)
    };
    run().map_err(|e| Error::Model(format!("{:#}", e)))
}

/// Packs an RGB image into an NCHW float buffer with `(p - mean) / std`.
pub fn to_nchw(image: &image::RgbImage, mean: f32, std: f32) -> Vec<f32> {
    let (w, h) = image.dimensions();
    let plane = (w * h) as usize;
    let mut data = vec![0.0f32; plane * 3];
    for (i, pixel) in image.pixels().enumerate() {
        for c in 0..3 {
            data[c * plane + i] = (pixel[c] as f32 - mean) / std;
        }
    }
    data
}

/// Packs an RGB image into an NHWC float buffer with `(p - mean) / std`.
pub fn to_nhwc(image: &image::RgbImage, mean: f32, std: f32) -> Vec<f32> {
    image.as_raw().iter().map(|&v| (v as f32 - mean) / std).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_nchw_planes() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 10]));
        img.put_pixel(1, 0, Rgb([0, 255, 20]));
        let data = to_nchw(&img, 0.0, 1.0);
        assert_eq!(data, vec![255.0, 0.0, 0.0, 255.0, 10.0, 20.0]);
    }

    #[test]
    fn test_nhwc_unit_range() {
        let img = RgbImage::from_pixel(1, 1, Rgb([255, 0, 51]));
        let data = to_nhwc(&img, 0.0, 255.0);
        assert_eq!(data, vec![1.0, 0.0, 0.2]);
    }
}
