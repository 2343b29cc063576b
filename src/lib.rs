pub mod analytics;
pub mod bbox;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod flight;
pub mod frame;
pub mod frame_queue;
pub mod fuser;
pub mod math;
pub mod operator;
pub mod session;
pub mod source;
pub mod sync;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod tracker;

#[cfg(feature = "opencv")]
pub mod cv;

pub use bbox::BBox;
pub use config::Config;
pub use error::{Error, Result};
pub use flight::FlightRecord;
pub use fuser::TrajectoryPoint;
pub use frame::Frame;
pub use session::{SessionReport, TrackedSample, TrackingSession};

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Which of the two recording viewpoints a session belongs to. Camera 1
/// supplies world X, camera 2 world Y; both see height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Camera {
    First,
    Second,
}

impl Camera {
    #[inline]
    pub fn slug(&self) -> &'static str {
        match self {
            Camera::First => "camera1",
            Camera::Second => "camera2",
        }
    }

    #[inline]
    pub fn index(&self) -> usize {
        match self {
            Camera::First => 0,
            Camera::Second => 1,
        }
    }
}

impl fmt::Display for Camera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Camera::First => f.write_str("camera 1"),
            Camera::Second => f.write_str("camera 2"),
        }
    }
}

/// Cooperative stop flag shared between a caller and running sessions.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
