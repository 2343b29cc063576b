//! Runtime configuration.
//!
//! Loaded from `flighttrack.toml` (working directory, optional) with
//! environment overrides in the form `FLIGHTTRACK__SECTION__KEY`.
//! Every key has a default, so an empty source yields a usable config.

use serde_derive::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::Error;
use crate::tracker::TrackerKind;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub field: FieldGeometry,
    #[serde(default)]
    pub bounds: LegalBounds,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrackingConfig {
    /// Nominal frame rate used to turn frame counters into seconds
    pub fps: f64,
    /// Every n-th processed frame contributes a sample
    pub sample_interval: u64,
    /// Preview size for the initial and lost-target prompts
    pub preview_scale: f32,
    /// Preview size for operator-triggered re-selection
    pub reselect_scale: f32,
    pub queue_capacity: usize,
    pub poll_interval_ms: u64,
    /// Frames skipped between prompts while the target is absent
    pub skip_schedule: Vec<u64>,
    pub tracker: TrackerKind,
}

impl TrackingConfig {
    #[inline]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            fps: 30.0,
            sample_interval: 15,
            preview_scale: 0.3,
            reselect_scale: 0.4,
            queue_capacity: 100,
            poll_interval_ms: 50,
            skip_schedule: vec![5, 15, 30, 60],
            tracker: TrackerKind::Kcf,
        }
    }
}

/// Fixed mapping from camera pixels to the flight volume.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default)]
pub struct FieldGeometry {
    pub frame_width: f64,
    pub frame_height: f64,
    pub width_m: f64,
    pub height_m: f64,
}

impl Default for FieldGeometry {
    fn default() -> Self {
        Self {
            frame_width: 3840.0,
            frame_height: 2160.0,
            width_m: 15.0,
            height_m: 10.0,
        }
    }
}

/// Inclusive volume a point must lie in to count as legal.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default)]
pub struct LegalBounds {
    pub x_max: f64,
    pub y_max: f64,
    pub z_max: f64,
}

impl Default for LegalBounds {
    fn default() -> Self {
        Self {
            x_max: 15.0,
            y_max: 15.0,
            z_max: 10.0,
        }
    }
}

impl From<&FieldGeometry> for LegalBounds {
    fn from(field: &FieldGeometry) -> Self {
        Self {
            x_max: field.width_m,
            y_max: field.width_m,
            z_max: field.height_m,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Sampling frequency of the speed profile, Hz
    pub sampling_hz: f64,
    /// Speed increase (m/s) below which a segment counts as holding
    pub holding_threshold: f64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            sampling_hz: 0.5,
            holding_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// A fatal error on one camera cancels the other
    AbortBoth,
    /// Keep whatever the healthy camera produces
    #[default]
    ContinuePartial,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub concurrent: bool,
    pub failure_policy: FailurePolicy,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            concurrent: true,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl Config {
    /// `./flighttrack.toml` if present, then `FLIGHTTRACK__*` variables.
    pub fn load() -> Result<Self, Error> {
        Self::build(config::File::with_name("flighttrack").required(false))
    }

    /// Same as [`Config::load`] with an explicit file that must exist.
    pub fn load_from(path: &Path) -> Result<Self, Error> {
        Self::build(config::File::from(path).required(true))
    }

    fn build<S>(file: S) -> Result<Self, Error>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("FLIGHTTRACK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize::<Config>()?)
    }
}
