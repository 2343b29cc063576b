use nalgebra as na;
use serde_derive::{Deserialize, Serialize};
use tracing::debug;

use crate::config::FieldGeometry;
use crate::session::TrackedSample;

/// One point of the 3D flight path in meters. A point with no coordinates
/// marks an instant where at least one camera lost the target.
///
/// Serialized as `[time, x, y, z]` with `null` for missing coordinates.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(
    from = "(f64, Option<f64>, Option<f64>, Option<f64>)",
    into = "(f64, Option<f64>, Option<f64>, Option<f64>)"
)]
pub struct TrajectoryPoint {
    pub time: f64,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

impl TrajectoryPoint {
    #[inline]
    pub fn new(time: f64, x: f64, y: f64, z: f64) -> Self {
        Self {
            time,
            x: Some(x),
            y: Some(y),
            z: Some(z),
        }
    }

    #[inline]
    pub fn gap(time: f64) -> Self {
        Self {
            time,
            x: None,
            y: None,
            z: None,
        }
    }

    #[inline]
    pub fn is_gap(&self) -> bool {
        self.position().is_none()
    }

    #[inline]
    pub fn position(&self) -> Option<na::Point3<f64>> {
        Some(na::Point3::new(self.x?, self.y?, self.z?))
    }
}

impl From<(f64, Option<f64>, Option<f64>, Option<f64>)> for TrajectoryPoint {
    #[inline]
    fn from((time, x, y, z): (f64, Option<f64>, Option<f64>, Option<f64>)) -> Self {
        Self { time, x, y, z }
    }
}

impl From<TrajectoryPoint> for (f64, Option<f64>, Option<f64>, Option<f64>) {
    #[inline]
    fn from(p: TrajectoryPoint) -> Self {
        (p.time, p.x, p.y, p.z)
    }
}

impl FieldGeometry {
    /// Horizontal pixel column to meters along the camera's world axis.
    #[inline]
    pub fn scale_x(&self, px: f64) -> f64 {
        (px / self.frame_width) * self.width_m
    }

    /// Mean of both cameras' pixel rows to height in meters. Rows grow
    /// downwards, height grows upwards.
    #[inline]
    pub fn scale_z(&self, row1: f64, row2: f64) -> f64 {
        ((self.frame_height - (row1 + row2) / 2.0) / self.frame_height) * self.height_m
    }
}

/// Fuses two index-aligned sample sequences into a 3D trajectory.
///
/// Camera 1 supplies world X, camera 2 world Y, height is averaged over
/// both. Time comes from camera 1 only. The last index of the shorter
/// sequence is never emitted, so the result holds
/// `min(len1, len2) - 1` points (none for an empty input).
pub fn merge(
    seq1: &[TrackedSample],
    seq2: &[TrackedSample],
    field: &FieldGeometry,
) -> Vec<TrajectoryPoint> {
    let n = seq1.len().min(seq2.len()).saturating_sub(1);

    let points: Vec<TrajectoryPoint> = seq1[..n]
        .iter()
        .zip(&seq2[..n])
        .map(|(a, b)| match (a.x, a.y, b.x, b.y) {
            (Some(x1), Some(y1), Some(x2), Some(y2)) => TrajectoryPoint::new(
                a.time,
                field.scale_x(x1),
                field.scale_x(x2),
                field.scale_z(y1, y2),
            ),
            _ => TrajectoryPoint::gap(a.time),
        })
        .collect();

    debug!(
        points = points.len(),
        gaps = points.iter().filter(|p| p.is_gap()).count(),
        "trajectories merged"
    );

    points
}

/// Time of the final point, zero for an empty trajectory.
#[inline]
pub fn flight_length(points: &[TrajectoryPoint]) -> f64 {
    points.last().map(|p| p.time).unwrap_or(0.0)
}
