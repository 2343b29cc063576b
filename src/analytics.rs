//! Motion analytics over a fused trajectory: legality filtering, segment
//! speeds and their bands, speed statistics and a smoothness score.

use nalgebra as na;
use tracing::debug;

use crate::config::{Config, LegalBounds};
use crate::error::{Error, Result};
use crate::flight::FlightRecord;
use crate::fuser::TrajectoryPoint;
use crate::math;

/// Anything that may hold a coordinate value. Values that do not read as a
/// finite number make a point illegal.
pub trait Coordinate {
    fn as_number(&self) -> Option<f64>;
}

impl Coordinate for f64 {
    #[inline]
    fn as_number(&self) -> Option<f64> {
        Some(*self)
    }
}

impl Coordinate for f32 {
    #[inline]
    fn as_number(&self) -> Option<f64> {
        Some(*self as f64)
    }
}

impl Coordinate for i32 {
    #[inline]
    fn as_number(&self) -> Option<f64> {
        Some(*self as f64)
    }
}

impl Coordinate for str {
    #[inline]
    fn as_number(&self) -> Option<f64> {
        self.trim().parse().ok()
    }
}

impl Coordinate for String {
    #[inline]
    fn as_number(&self) -> Option<f64> {
        self.as_str().as_number()
    }
}

impl Coordinate for serde_json::Value {
    fn as_number(&self) -> Option<f64> {
        match self {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.as_number(),
            _ => None,
        }
    }
}

impl<T: Coordinate> Coordinate for Option<T> {
    #[inline]
    fn as_number(&self) -> Option<f64> {
        self.as_ref()?.as_number()
    }
}

impl<T: Coordinate + ?Sized> Coordinate for &T {
    #[inline]
    fn as_number(&self) -> Option<f64> {
        (**self).as_number()
    }
}

/// Inside the inclusive volume `[0, x_max] x [0, y_max] x [0, z_max]`.
pub fn check_legal<X, Y, Z>(x: X, y: Y, z: Z, bounds: &LegalBounds) -> bool
where
    X: Coordinate,
    Y: Coordinate,
    Z: Coordinate,
{
    let within = |v: Option<f64>, max: f64| match v {
        Some(v) if v.is_finite() => (0.0..=max).contains(&v),
        _ => false,
    };

    within(x.as_number(), bounds.x_max)
        && within(y.as_number(), bounds.y_max)
        && within(z.as_number(), bounds.z_max)
}

/// Points of `coords` that are legal, in order.
pub fn legal_points(coords: &[TrajectoryPoint], bounds: &LegalBounds) -> Vec<TrajectoryPoint> {
    coords
        .iter()
        .filter(|p| check_legal(p.x, p.y, p.z, bounds))
        .copied()
        .collect()
}

/// Straight-line speed between two points. Both must carry a position;
/// gap points fail with `Error::MissingPosition`.
pub fn speed(a: &TrajectoryPoint, b: &TrajectoryPoint) -> Result<f64> {
    let pa = a.position().ok_or(Error::MissingPosition { time: a.time })?;
    let pb = b.position().ok_or(Error::MissingPosition { time: b.time })?;
    let dt = b.time - a.time;

    if dt == 0.0 {
        return Err(Error::ZeroTimeDelta { time: a.time });
    }

    Ok(na::distance(&pa, &pb) / dt)
}

/// Speed of every consecutive pair, `len - 1` values. Meant for the
/// output of [`legal_points`].
pub fn velocities(points: &[TrajectoryPoint]) -> Result<Vec<f64>> {
    points.windows(2).map(|w| speed(&w[0], &w[1])).collect()
}

/// How a segment's speed relates to the previous segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VelocityBand {
    /// First segment, nothing to compare with
    Steady,
    Decelerating,
    /// Speed rose, but by less than the holding threshold
    Holding,
    /// Speed rose by at least the threshold, or did not change at all
    Accelerating,
}

/// One band per segment; increases strictly between zero and `holding`
/// are treated as constant speed.
pub fn velocity_bands(velocities: &[f64], holding: f64) -> Vec<VelocityBand> {
    if velocities.is_empty() {
        return Vec::new();
    }

    std::iter::once(VelocityBand::Steady)
        .chain(velocities.windows(2).map(|w| {
            let delta = w[1] - w[0];

            if delta < 0.0 {
                VelocityBand::Decelerating
            } else if delta > 0.0 && delta < holding {
                VelocityBand::Holding
            } else {
                VelocityBand::Accelerating
            }
        }))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityStats {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

pub fn velocity_statistics(velocities: &[f64]) -> Result<VelocityStats> {
    let (avg, min, max) = math::mean_min_max(velocities).ok_or(Error::DegenerateProfile {
        len: 0,
        peak: 0.0,
    })?;

    Ok(VelocityStats { avg, min, max })
}

/// Dimensionless jerk of a speed profile sampled at `fs` Hz.
pub fn dimensionless_jerk(profile: &[f64], fs: f64) -> Result<f64> {
    let movement = na::DVector::from_column_slice(profile);
    let peak = math::peak_abs(&movement).unwrap_or(0.0);

    if profile.len() < 3 || peak == 0.0 || !peak.is_finite() {
        return Err(Error::DegenerateProfile {
            len: profile.len(),
            peak,
        });
    }

    let dt = 1.0 / fs;
    let duration = profile.len() as f64 * dt;
    let jerk = math::diff2(&movement) / dt.powi(2);
    let scale = duration.powi(3) / peak.powi(2);

    Ok(-scale * jerk.iter().map(|j| j * j).sum::<f64>() * dt)
}

/// Smoothness as the negative log of the absolute dimensionless jerk.
/// Higher is smoother.
pub fn log_dimensionless_jerk(profile: &[f64], fs: f64) -> Result<f64> {
    let smoothness = -dimensionless_jerk(profile, fs)?.abs().ln();

    if smoothness.is_finite() {
        Ok(smoothness)
    } else {
        Err(Error::DegenerateProfile {
            len: profile.len(),
            peak: math::peak_abs(&na::DVector::from_column_slice(profile)).unwrap_or(0.0),
        })
    }
}

/// Legal points whose time falls in `[t1, t2]`.
pub fn points_between(points: &[TrajectoryPoint], t1: f64, t2: f64) -> impl Iterator<Item = &TrajectoryPoint> {
    points.iter().filter(move |p| p.time >= t1 && p.time <= t2)
}

/// Fills the derived fields of `record` from its raw coordinates: legal
/// points, then velocities, then statistics and smoothness. Passes that
/// succeeded stay filled when a later one fails.
pub fn analyze(record: &mut FlightRecord, cfg: &Config) -> Result<()> {
    record.legal_points = legal_points(&record.coords, &cfg.bounds);
    record.velocities = velocities(&record.legal_points)?;

    debug!(
        coords = record.coords.len(),
        legal = record.legal_points.len(),
        "legality filter applied"
    );

    let stats = velocity_statistics(&record.velocities)?;
    record.avg_vel = stats.avg;
    record.min_vel = stats.min;
    record.max_vel = stats.max;

    record.smoothness = log_dimensionless_jerk(&record.velocities, cfg.analytics.sampling_hz)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> LegalBounds {
        LegalBounds::default()
    }

    #[test]
    fn legality_boundaries() {
        let b = bounds();

        assert!(check_legal(0.0, 0.0, 0.0, &b));
        assert!(check_legal(15.0, 15.0, 10.0, &b));
        assert!(check_legal(10.5, 5.5, 3.4, &b));
        assert!(!check_legal(-0.0001, 0.0, 0.0, &b));
        assert!(!check_legal(1.0, -4.0, 2.5, &b));
        assert!(!check_legal(1.0, 4.0, 10.0001, &b));
        assert!(!check_legal(15.0001, 0.0, 0.0, &b));
        assert!(!check_legal("not a number", 0.0, 0.0, &b));
        assert!(!check_legal(3.0, 2.0, "howdy", &b));
        assert!(check_legal("3.5", 2, 1.0f32, &b));
        assert!(!check_legal(f64::NAN, 0.0, 0.0, &b));
        assert!(!check_legal(None::<f64>, 0.0, 0.0, &b));
        assert!(!check_legal(serde_json::Value::Null, 0.0, 0.0, &b));
    }

    #[test]
    fn x_and_y_bounds_are_separate() {
        let b = LegalBounds {
            x_max: 30.0,
            y_max: 15.0,
            z_max: 10.0,
        };

        assert!(check_legal(30.0, 15.0, 10.0, &b));
        assert!(!check_legal(15.0, 30.0, 10.0, &b));
    }

    #[test]
    fn illegal_points_are_filtered_but_kept_in_raw() {
        let coords = vec![
            TrajectoryPoint::new(0.0, 1.0, 1.0, 1.0),
            TrajectoryPoint::gap(0.5),
            TrajectoryPoint::new(1.0, 16.0, 1.0, 1.0),
            TrajectoryPoint::new(1.5, 2.0, 2.0, 2.0),
        ];

        let legal = legal_points(&coords, &bounds());

        assert_eq!(legal, vec![coords[0], coords[3]]);
    }

    #[test]
    fn velocity_example() {
        let points = vec![
            TrajectoryPoint::new(0.0, 0.0, 0.0, 0.0),
            TrajectoryPoint::new(1.0, 0.0, 0.0, 1.0),
            TrajectoryPoint::new(2.0, 0.0, 0.0, 2.0),
            TrajectoryPoint::new(3.0, 1.0, 1.0, 3.0),
        ];

        let v = velocities(&points).unwrap();

        assert_eq!(v.len(), 3);
        assert!((v[0] - 1.0).abs() < 1e-12);
        assert!((v[1] - 1.0).abs() < 1e-12);
        assert!((v[2] - 3f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn velocity_uses_time_delta() {
        let v = velocities(&[
            TrajectoryPoint::new(1.0, 1.0, 1.0, 1.0),
            TrajectoryPoint::new(2.0, 3.0, 3.0, 1.0),
        ])
        .unwrap();

        assert_eq!(v, vec![8f64.sqrt()]);
        assert!(velocities(&[]).unwrap().is_empty());
    }

    #[test]
    fn zero_time_delta_is_an_error() {
        let err = velocities(&[
            TrajectoryPoint::new(1.0, 1.0, 1.0, 1.0),
            TrajectoryPoint::new(1.0, 2.0, 1.0, 1.0),
        ])
        .unwrap_err();

        assert!(matches!(err, Error::ZeroTimeDelta { .. }));
    }

    #[test]
    fn gap_points_have_no_speed() {
        let raw = vec![
            TrajectoryPoint::new(0.5, 1.0, 1.0, 1.0),
            TrajectoryPoint::gap(1.0),
            TrajectoryPoint::new(1.5, 2.0, 1.0, 1.0),
        ];

        let err = velocities(&raw).unwrap_err();
        assert!(matches!(err, Error::MissingPosition { time } if time == 1.0));

        let legal = legal_points(&raw, &bounds());
        assert_eq!(velocities(&legal).unwrap(), vec![1.0]);
    }

    #[test]
    fn bands_follow_speed_changes() {
        let bands = velocity_bands(&[1.0, 0.5, 0.7, 1.7, 1.7], 0.5);

        assert_eq!(
            bands,
            vec![
                VelocityBand::Steady,
                VelocityBand::Decelerating,
                VelocityBand::Holding,
                VelocityBand::Accelerating,
                VelocityBand::Accelerating,
            ]
        );
        assert!(velocity_bands(&[], 0.5).is_empty());
    }

    #[test]
    fn unchanged_speed_is_not_holding() {
        assert_eq!(
            velocity_bands(&[1.0, 1.0, 1.2, 1.2], 0.5),
            vec![
                VelocityBand::Steady,
                VelocityBand::Accelerating,
                VelocityBand::Holding,
                VelocityBand::Accelerating,
            ]
        );
    }

    #[test]
    fn statistics_of_velocities() {
        let stats = velocity_statistics(&[1.0, 3.0, 2.0]).unwrap();

        assert_eq!(stats, VelocityStats { avg: 2.0, min: 1.0, max: 3.0 });
        assert!(velocity_statistics(&[]).is_err());
    }

    #[test]
    fn smoothness_reference_values() {
        let s = log_dimensionless_jerk(&[1.0, 2.0, 4.0, 7.0], 0.5).unwrap();
        assert!((s - -0.9602099658089904).abs() < 1e-9);

        let quadratic: Vec<f64> = (0..10).map(|i| 0.1 * (i * i) as f64 + 1.0).collect();
        let s = log_dimensionless_jerk(&quadratic, 0.5).unwrap();
        assert!((s - -1.3517721687481628).abs() < 1e-9);
    }

    #[test]
    fn smoothness_rejects_degenerate_profiles() {
        assert!(matches!(
            log_dimensionless_jerk(&[1.0, 2.0], 0.5),
            Err(Error::DegenerateProfile { len: 2, .. })
        ));
        assert!(matches!(
            log_dimensionless_jerk(&[0.0, 0.0, 0.0, 0.0], 0.5),
            Err(Error::DegenerateProfile { .. })
        ));
        // constant speed has no jerk at all
        assert!(log_dimensionless_jerk(&[2.0, 2.0, 2.0], 0.5).is_err());
    }

    #[test]
    fn window_query() {
        let points: Vec<_> = (0..10).map(|i| TrajectoryPoint::gap(i as f64 * 0.5)).collect();

        assert_eq!(points_between(&points, 1.0, 2.0).count(), 3);
    }
}
