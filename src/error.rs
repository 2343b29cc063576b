use std::path::PathBuf;
use thiserror::Error;

use crate::Camera;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{camera}: video file not present or cannot be opened: {}", path.display())]
    VideoNotPresent { camera: Camera, path: PathBuf },

    #[error("{camera}: video is corrupted, first frame cannot be decoded: {}", path.display())]
    VideoCorrupted { camera: Camera, path: PathBuf },

    #[error("{camera}: tracker rejected the initial selection")]
    TrackerInit { camera: Camera },

    #[error("{camera}: frame source produced no frames")]
    NoFrames { camera: Camera },

    #[error("{camera}: tracking session cancelled")]
    Cancelled { camera: Camera },

    #[error("speed profile too short or flat for smoothness (len {len}, peak {peak})")]
    DegenerateProfile { len: usize, peak: f64 },

    #[error("consecutive points share the timestamp {time}")]
    ZeroTimeDelta { time: f64 },

    #[error("point at {time} has no position, speeds need legal points")]
    MissingPosition { time: f64 },

    #[error("backend error: {0}")]
    Backend(String),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config Error: {0}")]
    Config(#[from] config::ConfigError),

    #[cfg(feature = "opencv")]
    #[error("OpenCV Error: {0}")]
    OpenCv(#[from] opencv::Error),
}

impl Error {
    /// Camera the error belongs to, if it is a per-session failure.
    pub fn camera(&self) -> Option<Camera> {
        match self {
            Error::VideoNotPresent { camera, .. }
            | Error::VideoCorrupted { camera, .. }
            | Error::TrackerInit { camera }
            | Error::NoFrames { camera }
            | Error::Cancelled { camera } => Some(*camera),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
