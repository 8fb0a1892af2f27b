use std::ops::{Add, Sub};

/// Represents a single detector landmark (x, y normalized to [0,1], z depth-relative)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3D {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// A point in frame pixel space.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point2D {
    pub x: f32,
    pub y: f32,
}

impl Point2D {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point2D) -> f32 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Blend toward `previous`: `previous * weight + self * (1 - weight)`.
    pub fn lerp_toward(self, previous: Point2D, weight: f32) -> Point2D {
        Point2D {
            x: previous.x * weight + self.x * (1.0 - weight),
            y: previous.y * weight + self.y * (1.0 - weight),
        }
    }
}

impl Add for Point2D {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point2D {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// One frame of detector output. Never mutated once produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LandmarkSet {
    points: Vec<Point3D>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Point3D>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Point3D> {
        self.points.get(index)
    }

    pub fn points(&self) -> &[Point3D] {
        &self.points
    }

    pub(crate) fn points_mut(&mut self) -> &mut [Point3D] {
        &mut self.points
    }

    /// Landmark `index` scaled into pixel space.
    pub fn to_pixel(&self, index: usize, frame: FrameSize) -> Option<Point2D> {
        self.points
            .get(index)
            .map(|p| Point2D::new(p.x * frame.width as f32, p.y * frame.height as f32))
    }

    /// Normalized bounding box over the given indices (all points when `None`).
    pub fn bounds(&self, indices: Option<&[usize]>) -> Option<NormalizedBounds> {
        let mut bounds: Option<NormalizedBounds> = None;
        let mut include = |p: &Point3D| {
            let b = bounds.get_or_insert(NormalizedBounds {
                min_x: p.x,
                min_y: p.y,
                max_x: p.x,
                max_y: p.y,
            });
            b.min_x = b.min_x.min(p.x);
            b.min_y = b.min_y.min(p.y);
            b.max_x = b.max_x.max(p.x);
            b.max_y = b.max_y.max(p.y);
        };
        match indices {
            Some(indices) => indices
                .iter()
                .filter_map(|&i| self.points.get(i))
                .for_each(&mut include),
            None => self.points.iter().for_each(&mut include),
        }
        bounds
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedBounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl NormalizedBounds {
    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }
}

/// Canvas / video frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Integer pixel rectangle, `left..right` x `top..bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl PixelRect {
    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lerp_weights_previous() {
        let fresh = Point2D::new(10.0, 0.0);
        let prev = Point2D::new(0.0, 0.0);
        let out = fresh.lerp_toward(prev, 0.75);
        assert!((out.x - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_bounds_subset() {
        let set = LandmarkSet::new(vec![
            Point3D::new(0.1, 0.2, 0.0),
            Point3D::new(0.5, 0.9, 0.0),
            Point3D::new(0.3, 0.4, 0.0),
        ]);
        let all = set.bounds(None).unwrap();
        assert_eq!((all.min_x, all.max_y), (0.1, 0.9));

        let some = set.bounds(Some(&[0, 2])).unwrap();
        assert_eq!((some.max_x, some.max_y), (0.3, 0.4));

        assert!(set.bounds(Some(&[7])).is_none());
    }
}
