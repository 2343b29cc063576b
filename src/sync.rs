//! Start-of-flight detection from the ground light flash seen by both
//! cameras.

use crate::error::Result;
use crate::frame::Frame;
use crate::frame_queue::Pull;
use crate::source::FrameSource;
use crate::CancelToken;

/// Exclusive range of lit pixel counts that reads as "light on". Fewer
/// pixels is noise, more is a washed out frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightWindow {
    pub min_pixels: u64,
    pub max_pixels: u64,
}

impl Default for LightWindow {
    fn default() -> Self {
        Self {
            min_pixels: 100_000,
            max_pixels: 180_000,
        }
    }
}

impl LightWindow {
    #[inline]
    pub fn contains(&self, lit: u64) -> bool {
        lit > self.min_pixels && lit < self.max_pixels
    }
}

/// Index of the first frame on which `is_lit` holds.
pub fn first_flash<F, I, P>(frames: I, mut is_lit: P) -> Result<Option<usize>>
where
    I: IntoIterator<Item = F>,
    P: FnMut(&F) -> Result<bool>,
{
    for (index, frame) in frames.into_iter().enumerate() {
        if is_lit(&frame)? {
            return Ok(Some(index));
        }
    }

    Ok(None)
}

/// Pulls from `source` until the flash shows up. Frames up to and
/// including the flash are consumed.
pub fn wait_for_flash<F, P>(source: &FrameSource<F>, cancel: &CancelToken, is_lit: P) -> Result<Option<usize>>
where
    F: Frame,
    P: FnMut(&F) -> Result<bool>,
{
    let frames = std::iter::from_fn(|| match source.pull(cancel) {
        Pull::Item(frame) => Some(frame),
        Pull::Exhausted | Pull::Cancelled => None,
    });

    let found = first_flash(frames, is_lit)?;

    if found.is_none() && cancel.is_cancelled() {
        return Err(crate::Error::Cancelled {
            camera: source.camera(),
        });
    }

    Ok(found)
}

/// Seconds into the video of frame `index`.
#[inline]
pub fn start_offset(index: usize, fps: f64) -> f64 {
    index as f64 / fps
}
