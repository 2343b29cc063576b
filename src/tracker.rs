use serde_derive::Deserialize;
use std::fmt;

use crate::bbox::{BBox, Ltwh};
use crate::error::Result;
use crate::frame::Frame;

/// Single-target visual tracker seeded from a box on one frame.
///
/// Errors are reserved for backend faults; losing the target is reported
/// through the boolean flags.
pub trait VisualTracker<F: Frame>: Send {
    /// `false` when the box cannot seed the tracker (degenerate or off-frame).
    fn init(&mut self, frame: &F, bbox: BBox<Ltwh>) -> Result<bool>;

    /// Advances by one frame. `(false, _)` means the target was lost.
    fn update(&mut self, frame: &F) -> Result<(bool, BBox<Ltwh>)>;
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrackerKind {
    /// Kernelized correlation filter
    #[default]
    Kcf,
    /// Discriminative correlation filter with channel and spatial reliability
    Csrt,
}

impl fmt::Display for TrackerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerKind::Kcf => f.write_str("KCF"),
            TrackerKind::Csrt => f.write_str("CSRT"),
        }
    }
}

/// Builds fresh tracker instances. A lost tracker is never reseeded in
/// place: every re-acquisition asks the factory for a new one.
pub trait TrackerFactory<F: Frame>: Sync {
    fn create(&self, kind: TrackerKind) -> Result<Box<dyn VisualTracker<F>>>;
}
