//! In-memory stand-ins for the video, tracker and operator capabilities.
//!
//! They let sessions, the coordinator and the whole pipeline run without a
//! video backend: frames are just indices, trackers follow a per-frame
//! script and the operator replays a queue of answers.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::bbox::{BBox, Ltwh};
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::operator::{Operator, OperatorAction, SelectReason};
use crate::source::{VideoBackend, VideoDecoder};
use crate::tracker::{TrackerFactory, TrackerKind, VisualTracker};
use crate::Camera;

/// Synthetic frame carrying its position in the stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestFrame {
    pub index: usize,
    pub width: u32,
    pub height: u32,
    /// Size relative to the decoded frame, 1.0 unless downscaled
    pub scale: f32,
}

impl TestFrame {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            width: 3840,
            height: 2160,
            scale: 1.0,
        }
    }
}

impl Frame for TestFrame {
    fn dims(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn downscale(&self, factor: f32) -> Result<Self> {
        Ok(Self {
            index: self.index,
            width: (self.width as f32 * factor) as u32,
            height: (self.height as f32 * factor) as u32,
            scale: self.scale * factor,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Script {
    Frames(usize),
    BrokenAfter(usize),
}

/// Maps paths to synthetic videos of a given length.
#[derive(Debug, Default, Clone)]
pub struct ScriptedBackend {
    videos: HashMap<PathBuf, Script>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_video<P: Into<PathBuf>>(mut self, path: P, frames: usize) -> Self {
        self.videos.insert(path.into(), Script::Frames(frames));
        self
    }

    /// Video whose decoder errors after `frames` good frames.
    pub fn with_broken_video<P: Into<PathBuf>>(mut self, path: P, frames: usize) -> Self {
        self.videos.insert(path.into(), Script::BrokenAfter(frames));
        self
    }
}

impl VideoBackend<TestFrame> for ScriptedBackend {
    type Decoder = ScriptedDecoder;

    fn open(&self, camera: Camera, path: &Path) -> Result<ScriptedDecoder> {
        let script = self.videos.get(path).copied().ok_or_else(|| Error::VideoNotPresent {
            camera,
            path: path.to_path_buf(),
        })?;

        Ok(ScriptedDecoder { script, next: 0 })
    }
}

pub struct ScriptedDecoder {
    script: Script,
    next: usize,
}

impl VideoDecoder<TestFrame> for ScriptedDecoder {
    fn read(&mut self) -> Result<Option<TestFrame>> {
        let index = self.next;

        match self.script {
            Script::Frames(total) if index >= total => return Ok(None),
            Script::BrokenAfter(good) if index >= good => {
                return Err(Error::Backend(format!("undecodable frame {}", index)))
            }
            _ => {}
        }

        self.next += 1;

        Ok(Some(TestFrame::new(index)))
    }
}

type FrameScript = Arc<dyn Fn(usize) -> bool + Send + Sync>;

/// Tracker factory whose trackers hold their seed box and succeed on the
/// frames the script allows.
#[derive(Clone)]
pub struct ScriptedTrackers {
    ok_on: FrameScript,
    created: Arc<AtomicUsize>,
    seeded: Arc<Mutex<Vec<BBox<Ltwh>>>>,
}

impl ScriptedTrackers {
    pub fn new<S>(ok_on: S) -> Self
    where
        S: Fn(usize) -> bool + Send + Sync + 'static,
    {
        Self {
            ok_on: Arc::new(ok_on),
            created: Arc::new(AtomicUsize::new(0)),
            seeded: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn always_ok() -> Self {
        Self::new(|_| true)
    }

    pub fn failing_on<S>(fails: S) -> Self
    where
        S: Fn(usize) -> bool + Send + Sync + 'static,
    {
        Self::new(move |frame| !fails(frame))
    }

    /// Tracker instances built so far.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Boxes passed to successful `init` calls, in order.
    pub fn seeded(&self) -> Vec<BBox<Ltwh>> {
        self.seeded.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl TrackerFactory<TestFrame> for ScriptedTrackers {
    fn create(&self, _kind: TrackerKind) -> Result<Box<dyn VisualTracker<TestFrame>>> {
        self.created.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(ScriptedTracker {
            ok_on: self.ok_on.clone(),
            seeded: self.seeded.clone(),
            bbox: None,
        }))
    }
}

struct ScriptedTracker {
    ok_on: FrameScript,
    seeded: Arc<Mutex<Vec<BBox<Ltwh>>>>,
    bbox: Option<BBox<Ltwh>>,
}

impl VisualTracker<TestFrame> for ScriptedTracker {
    fn init(&mut self, frame: &TestFrame, bbox: BBox<Ltwh>) -> Result<bool> {
        if !bbox.fits(frame.dims()) {
            return Ok(false);
        }

        if let Ok(mut seeded) = self.seeded.lock() {
            seeded.push(bbox);
        }
        self.bbox = Some(bbox);

        Ok(true)
    }

    fn update(&mut self, frame: &TestFrame) -> Result<(bool, BBox<Ltwh>)> {
        match self.bbox {
            Some(bbox) if (self.ok_on)(frame.index) => Ok((true, bbox)),
            _ => Ok((false, BBox::NO_SELECTION)),
        }
    }
}

/// Replays queued full-resolution answers, then reports no target.
#[derive(Debug, Default, Clone)]
pub struct ScriptedOperator {
    answers: VecDeque<BBox<Ltwh>>,
    reselect_on: HashSet<usize>,
    prompts: Vec<(usize, SelectReason, f32)>,
}

impl ScriptedOperator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, bbox: BBox<Ltwh>) -> Self {
        self.answers.push_back(bbox);
        self
    }

    /// Requests a manual re-selection when shown this frame.
    pub fn reselect_on(mut self, frame: usize) -> Self {
        self.reselect_on.insert(frame);
        self
    }

    /// (frame index, reason, preview scale) of every prompt.
    pub fn prompts(&self) -> &[(usize, SelectReason, f32)] {
        &self.prompts
    }
}

impl Operator<TestFrame> for ScriptedOperator {
    fn select(&mut self, preview: &TestFrame, reason: SelectReason) -> Result<BBox<Ltwh>> {
        self.prompts.push((preview.index, reason, preview.scale));

        Ok(self
            .answers
            .pop_front()
            .map(|bbox| bbox.scaled(preview.scale))
            .unwrap_or(BBox::NO_SELECTION))
    }

    fn present(&mut self, frame: &TestFrame, _bbox: Option<&BBox<Ltwh>>) -> Result<OperatorAction> {
        if self.reselect_on.remove(&frame.index) {
            Ok(OperatorAction::Reselect)
        } else {
            Ok(OperatorAction::Continue)
        }
    }
}
