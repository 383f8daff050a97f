use crate::error::{AlignError, AlignResult};
use crate::optimizer::particle::uniform_in_box;
use crate::vector::Vector;
use fastrand::Rng;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// A massed 2-D point. Dummies carry no mass and only exist to equalise
/// cloud sizes before transport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedPoint {
    pub x: f64,
    pub y: f64,
    pub mass: f64,
    #[serde(default)]
    pub is_dummy: bool,
}

impl WeightedPoint {
    pub fn new(x: f64, y: f64, mass: f64) -> Self {
        Self {
            x,
            y,
            mass,
            is_dummy: false,
        }
    }

    pub fn dummy() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            mass: 0.0,
            is_dummy: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CsvPoint {
    x: f64,
    y: f64,
    mass: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PointCloud {
    points: Vec<WeightedPoint>,
}

impl PointCloud {
    pub fn new(points: Vec<WeightedPoint>) -> AlignResult<Self> {
        for (i, p) in points.iter().enumerate() {
            if !(p.x.is_finite() && p.y.is_finite()) {
                return Err(AlignError::Validation(format!(
                    "point {} has non-finite coordinates",
                    i
                )));
            }
            if !(p.mass.is_finite() && p.mass >= 0.0) {
                return Err(AlignError::Validation(format!(
                    "point {} has invalid mass {}",
                    i, p.mass
                )));
            }
            if p.is_dummy && p.mass != 0.0 {
                return Err(AlignError::Validation(format!(
                    "dummy point {} must have zero mass",
                    i
                )));
            }
        }
        Ok(Self { points })
    }

    /// Reads `x,y,mass` rows (with header).
    pub fn load_csv<P: AsRef<Path>>(path: P) -> AlignResult<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let cloud = Self::from_reader(file)?;
        debug!("Loaded {} points from {}", cloud.len(), path.display());
        Ok(cloud)
    }

    pub fn from_reader<R: Read>(reader: R) -> AlignResult<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut points = Vec::new();
        for result in rdr.deserialize() {
            let rec: CsvPoint = result?;
            points.push(WeightedPoint::new(rec.x, rec.y, rec.mass));
        }
        Self::new(points)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[WeightedPoint] {
        &self.points
    }

    pub fn masses(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.mass).collect()
    }

    pub fn total_mass(&self) -> f64 {
        self.points.iter().map(|p| p.mass).sum()
    }

    /// Rescales masses to sum to one.
    pub fn normalized(&self) -> AlignResult<Self> {
        let total = self.total_mass();
        if !(total > 0.0) {
            return Err(AlignError::Validation(
                "cannot normalise a cloud with no mass".into(),
            ));
        }
        Ok(Self {
            points: self
                .points
                .iter()
                .map(|p| WeightedPoint {
                    mass: p.mass / total,
                    ..*p
                })
                .collect(),
        })
    }

    /// Appends dummies until the cloud holds `size` points. Larger clouds are returned as is.
    pub fn padded_to(&self, size: usize) -> Self {
        let mut points = self.points.clone();
        if points.len() < size {
            points.resize(size, WeightedPoint::dummy());
        }
        Self { points }
    }

    /// Mass-weighted centre of the real points; the plain centroid when they carry no mass.
    pub fn center_of_mass(&self) -> (f64, f64) {
        let real = || self.points.iter().filter(|p| !p.is_dummy);
        let total: f64 = real().map(|p| p.mass).sum();
        if total > 0.0 {
            let x = real().map(|p| p.x * p.mass).sum::<f64>() / total;
            let y = real().map(|p| p.y * p.mass).sum::<f64>() / total;
            return (x, y);
        }
        let count = real().count();
        if count == 0 {
            return (0.0, 0.0);
        }
        let x = real().map(|p| p.x).sum::<f64>() / count as f64;
        let y = real().map(|p| p.y).sum::<f64>() / count as f64;
        (x, y)
    }

    fn map_real(&self, f: impl Fn(f64, f64) -> (f64, f64)) -> Self {
        Self {
            points: self
                .points
                .iter()
                .map(|p| {
                    if p.is_dummy {
                        *p
                    } else {
                        let (x, y) = f(p.x, p.y);
                        WeightedPoint { x, y, ..*p }
                    }
                })
                .collect(),
        }
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        self.map_real(|x, y| (x + dx, y + dy))
    }

    /// Counter-clockwise rotation by `theta` radians about `center`.
    pub fn rotated_about(&self, center: (f64, f64), theta: f64) -> Self {
        let (sin, cos) = theta.sin_cos();
        let (cx, cy) = center;
        self.map_real(|x, y| {
            let (rx, ry) = (x - cx, y - cy);
            (cx + rx * cos - ry * sin, cy + rx * sin + ry * cos)
        })
    }

    pub fn scaled_about(&self, center: (f64, f64), sx: f64, sy: f64) -> Self {
        let (cx, cy) = center;
        self.map_real(|x, y| (cx + (x - cx) * sx, cy + (y - cy) * sy))
    }
}

/// Translation, then axis scaling about the centre of mass, then rotation about it.
///
/// Scale entries are offsets from identity, so the zero vector maps a cloud onto itself.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Transform {
    pub shift: (f64, f64),
    pub rotation: f64,
    pub scale_offset: (f64, f64),
}

impl Transform {
    /// Accepts 2 (shift), 3 (+ rotation) or 5 (+ x/y scale) parameters.
    pub fn from_parameters(params: &Vector) -> AlignResult<Self> {
        let c = params.components();
        match c.len() {
            2 => Ok(Self {
                shift: (c[0], c[1]),
                ..Self::default()
            }),
            3 => Ok(Self {
                shift: (c[0], c[1]),
                rotation: c[2],
                ..Self::default()
            }),
            5 => Ok(Self {
                shift: (c[0], c[1]),
                rotation: c[2],
                scale_offset: (c[3], c[4]),
            }),
            found => Err(AlignError::DimensionMismatch { expected: 5, found }),
        }
    }

    /// Draws every parameter uniformly from `[-b_i, b_i]`, then builds the transform
    /// as [`Transform::from_parameters`] does.
    pub fn random(bounds: &Vector, rng: &mut Rng) -> AlignResult<Self> {
        if let Some(b) = bounds
            .components()
            .iter()
            .find(|b| !(b.is_finite() && **b >= 0.0))
        {
            return Err(AlignError::Validation(format!(
                "perturbation bounds must be finite and non-negative, got {}",
                b
            )));
        }
        let params = Vector::new(uniform_in_box(rng, bounds.components()));
        Self::from_parameters(&params)
    }

    pub fn apply(&self, cloud: &PointCloud) -> PointCloud {
        let shifted = cloud.translated(self.shift.0, self.shift.1);
        let scaled = if self.scale_offset == (0.0, 0.0) {
            shifted
        } else {
            let com = shifted.center_of_mass();
            shifted.scaled_about(com, 1.0 + self.scale_offset.0, 1.0 + self.scale_offset.1)
        };
        if self.rotation == 0.0 {
            return scaled;
        }
        let com = scaled.center_of_mass();
        scaled.rotated_about(com, self.rotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    const EPS: f64 = 1e-12;

    fn square() -> PointCloud {
        PointCloud::new(vec![
            WeightedPoint::new(0.0, 0.0, 1.0),
            WeightedPoint::new(2.0, 0.0, 1.0),
            WeightedPoint::new(2.0, 2.0, 1.0),
            WeightedPoint::new(0.0, 2.0, 1.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_rejects_negative_mass() {
        let res = PointCloud::new(vec![WeightedPoint::new(0.0, 0.0, -1.0)]);
        assert!(matches!(res, Err(AlignError::Validation(_))));
    }

    #[test]
    fn test_from_reader_parses_header_rows() {
        let data = "x,y,mass\n1.0, 2.0, 0.5\n-3,4,1.5\n";
        let cloud = PointCloud::from_reader(data.as_bytes()).unwrap();
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.points()[1], WeightedPoint::new(-3.0, 4.0, 1.5));
    }

    #[test]
    fn test_from_reader_rejects_garbage() {
        let data = "x,y,mass\n1.0,abc,0.5\n";
        assert!(matches!(
            PointCloud::from_reader(data.as_bytes()),
            Err(AlignError::Csv(_))
        ));
    }

    #[test]
    fn test_normalize_and_pad() {
        let cloud = square().normalized().unwrap().padded_to(6);
        assert_eq!(cloud.len(), 6);
        assert!((cloud.total_mass() - 1.0).abs() < EPS);
        assert!(cloud.points()[4].is_dummy);
        assert!(PointCloud::default().normalized().is_err());
    }

    #[test]
    fn test_center_of_mass_ignores_dummies() {
        let cloud = square().padded_to(10);
        let (x, y) = cloud.center_of_mass();
        assert!((x - 1.0).abs() < EPS && (y - 1.0).abs() < EPS);
    }

    #[test]
    fn test_rotation_keeps_dummies_in_place() {
        let cloud = square().padded_to(5).translated(3.0, 3.0);
        let rotated = cloud.rotated_about((4.0, 4.0), FRAC_PI_2);
        assert_eq!(rotated.points()[4], WeightedPoint::dummy());
        // (3,3) around (4,4) by 90 degrees lands on (5,3).
        let p = rotated.points()[0];
        assert!((p.x - 5.0).abs() < EPS && (p.y - 3.0).abs() < EPS);
    }

    #[test]
    fn test_zero_transform_is_identity() {
        for dim in [2, 3, 5] {
            let t = Transform::from_parameters(&Vector::zeros(dim)).unwrap();
            assert_eq!(t.apply(&square()), square());
        }
        assert!(Transform::from_parameters(&Vector::zeros(4)).is_err());
    }

    #[test]
    fn test_random_transform_stays_in_bounds() {
        let bounds = Vector::new(vec![2.0, 1.0, 0.3, 0.1, 0.0]);
        let mut rng = Rng::with_seed(21);
        for _ in 0..100 {
            let t = Transform::random(&bounds, &mut rng).unwrap();
            assert!(t.shift.0.abs() <= 2.0 && t.shift.1.abs() <= 1.0);
            assert!(t.rotation.abs() <= 0.3);
            assert!(t.scale_offset.0.abs() <= 0.1);
            assert_eq!(t.scale_offset.1, 0.0);
        }

        let a = Transform::random(&bounds, &mut Rng::with_seed(4)).unwrap();
        let b = Transform::random(&bounds, &mut Rng::with_seed(4)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_random_transform_rejects_bad_bounds() {
        let mut rng = Rng::with_seed(0);
        assert!(matches!(
            Transform::random(&Vector::new(vec![1.0, -1.0]), &mut rng),
            Err(AlignError::Validation(_))
        ));
        assert!(matches!(
            Transform::random(&Vector::new(vec![1.0; 4]), &mut rng),
            Err(AlignError::DimensionMismatch { expected: 5, found: 4 })
        ));
    }

    #[test]
    fn test_scale_about_center_of_mass() {
        let t = Transform::from_parameters(&Vector::new(vec![0.0, 0.0, 0.0, 1.0, 0.0])).unwrap();
        let out = t.apply(&square());
        // x doubles around x=1, y untouched.
        let xs: Vec<f64> = out.points().iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![-1.0, 3.0, 3.0, -1.0]);
        assert_eq!(out.center_of_mass(), (1.0, 1.0));
    }
}
