//! Single-camera tracking session.
//!
//! Drives one video from the first operator selection to the end of the
//! stream, rebuilding the tracker whenever the target is lost and recording
//! the target center every `sample_interval` frames.
//!
//! Frame counting: the frame the operator selects on is frame 0, every
//! frame pulled afterwards advances the counter by one, so a sample taken on
//! frame `n` is stamped `n / fps` seconds.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::bbox::{BBox, Ltwh};
use crate::config::TrackingConfig;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::frame_queue::Pull;
use crate::operator::{Operator, OperatorAction, SelectReason};
use crate::source::{FrameSource, VideoBackend};
use crate::tracker::{TrackerFactory, VisualTracker};
use crate::{CancelToken, Camera};

/// Target center at a sampling instant, or a gap when the target was not
/// tracked at that instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedSample {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub time: f64,
}

impl TrackedSample {
    #[inline]
    pub fn at(x: f64, y: f64, time: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            time,
        }
    }

    #[inline]
    pub fn gap(time: f64) -> Self {
        Self {
            x: None,
            y: None,
            time,
        }
    }

    #[inline]
    pub fn is_gap(&self) -> bool {
        self.x.is_none() || self.y.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingSelection,
    Tracking,
    Reacquiring,
    Finished,
}

/// Escalating number of frames to skip while the target is out of view.
/// Holds at the last entry of the schedule.
#[derive(Debug, Clone)]
pub struct SkipBackoff {
    schedule: Vec<u64>,
    tier: usize,
}

impl SkipBackoff {
    pub fn new(schedule: &[u64]) -> Self {
        let schedule: Vec<u64> = schedule.iter().map(|&s| s.max(1)).collect();

        Self {
            schedule: if schedule.is_empty() { vec![1] } else { schedule },
            tier: 0,
        }
    }

    #[inline]
    pub fn current(&self) -> u64 {
        self.schedule[self.tier]
    }

    /// Returns the current skip length and moves to the next tier.
    pub fn advance(&mut self) -> u64 {
        let skip = self.current();
        self.tier = (self.tier + 1).min(self.schedule.len() - 1);

        skip
    }

    #[inline]
    pub fn reset(&mut self) {
        self.tier = 0;
    }
}

/// Result of a finished session.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub camera: Camera,
    pub samples: Vec<TrackedSample>,
    /// Frames the reader thread decoded
    pub frames_decoded: usize,
    /// Frames the session consumed, the selection frame included
    pub frames_processed: u64,
    /// Trackers rebuilt after the initial one
    pub reacquisitions: usize,
    /// Operator selection prompts shown
    pub prompts: usize,
}

pub struct TrackingSession<'a, F: Frame, O: Operator<F>> {
    camera: Camera,
    cfg: &'a TrackingConfig,
    trackers: &'a dyn TrackerFactory<F>,
    operator: &'a mut O,
    cancel: CancelToken,
    seed: Option<BBox<Ltwh>>,
    state: SessionState,
    counter: u64,
    samples: Vec<TrackedSample>,
    backoff: SkipBackoff,
    reacquisitions: usize,
    prompts: usize,
}

impl<'a, F: Frame, O: Operator<F>> TrackingSession<'a, F, O> {
    pub fn new(
        camera: Camera,
        cfg: &'a TrackingConfig,
        trackers: &'a dyn TrackerFactory<F>,
        operator: &'a mut O,
    ) -> Self {
        Self {
            camera,
            cfg,
            trackers,
            operator,
            cancel: CancelToken::new(),
            seed: None,
            state: SessionState::AwaitingSelection,
            counter: 0,
            samples: Vec::new(),
            backoff: SkipBackoff::new(&cfg.skip_schedule),
            reacquisitions: 0,
            prompts: 0,
        }
    }

    /// Full-resolution box used instead of the initial operator prompt.
    pub fn with_seed(mut self, seed: BBox<Ltwh>) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Opens `path` and runs the session over it.
    pub fn run_video<B: VideoBackend<F>>(self, path: &Path, backend: &B) -> Result<SessionReport> {
        let source = FrameSource::open(
            self.camera,
            path,
            backend,
            self.cfg.queue_capacity,
            self.cfg.poll_interval(),
        )?;

        self.run(source)
    }

    /// Tracks until `source` is exhausted. The source is closed either way.
    pub fn run(mut self, source: FrameSource<F>) -> Result<SessionReport> {
        info!(camera = %self.camera, path = %source.path().display(), "tracking session started");

        let outcome = self.drive(&source);
        let frames_decoded = source.close();
        outcome?;

        info!(
            camera = %self.camera,
            samples = self.samples.len(),
            frames = self.counter + 1,
            reacquisitions = self.reacquisitions,
            "tracking session finished"
        );

        Ok(SessionReport {
            camera: self.camera,
            samples: self.samples,
            frames_decoded,
            frames_processed: self.counter + 1,
            reacquisitions: self.reacquisitions,
            prompts: self.prompts,
        })
    }

    fn drive(&mut self, source: &FrameSource<F>) -> Result<()> {
        let first = match source.pull(&self.cancel) {
            Pull::Item(frame) => frame,
            Pull::Exhausted => return Err(Error::NoFrames { camera: self.camera }),
            Pull::Cancelled => return Err(Error::Cancelled { camera: self.camera }),
        };

        self.counter = 0;
        let mut tracker = self.acquire(&first)?;
        drop(first);
        self.enter(SessionState::Tracking);

        loop {
            let frame = match self.next_frame(source)? {
                Some(frame) => frame,
                None => break,
            };

            let (ok, bbox) = tracker.update(&frame)?;

            if ok {
                if self.on_boundary() {
                    let (cx, cy) = bbox.center();
                    self.samples
                        .push(TrackedSample::at(cx as f64, cy as f64, self.time()));
                }

                if self.operator.present(&frame, Some(&bbox))? == OperatorAction::Reselect {
                    self.reselect(&frame, &mut tracker)?;
                }
            } else {
                debug!(camera = %self.camera, frame = self.counter, "tracking failure");
                self.enter(SessionState::Reacquiring);

                match self.reacquire(source, frame)? {
                    Some((fresh, frame)) => {
                        tracker = fresh;
                        self.enter(SessionState::Tracking);

                        if self.operator.present(&frame, None)? == OperatorAction::Reselect {
                            self.reselect(&frame, &mut tracker)?;
                        }
                    }
                    None => break,
                }
            }
        }

        self.enter(SessionState::Finished);

        Ok(())
    }

    /// Initial box from the seed or the operator, then the first tracker.
    fn acquire(&mut self, frame: &F) -> Result<Box<dyn VisualTracker<F>>> {
        let bbox = match self.seed {
            Some(seed) => seed,
            None => self.prompt(frame, SelectReason::Initial, self.cfg.preview_scale)?,
        };

        self.build_tracker(frame, bbox)?
            .ok_or(Error::TrackerInit { camera: self.camera })
    }

    /// Prompts on the lost frame until the operator supplies a usable box.
    /// An empty selection skips ahead by the current backoff tier, leaving
    /// gap samples behind. Returns the new tracker with the frame it was
    /// seeded on, `None` when the video ends while skipping.
    fn reacquire(
        &mut self,
        source: &FrameSource<F>,
        mut frame: F,
    ) -> Result<Option<(Box<dyn VisualTracker<F>>, F)>> {
        self.backoff.reset();

        loop {
            let bbox = self.prompt(&frame, SelectReason::Lost, self.cfg.preview_scale)?;

            if bbox.is_no_selection() {
                let skip = self.backoff.advance();
                info!(camera = %self.camera, frame = self.counter, skip, "target absent, skipping frames");

                for _ in 0..skip {
                    if self.on_boundary() {
                        self.samples.push(TrackedSample::gap(self.time()));
                    }

                    frame = match self.next_frame(source)? {
                        Some(next) => next,
                        None => return Ok(None),
                    };
                }

                continue;
            }

            match self.build_tracker(&frame, bbox)? {
                Some(tracker) => {
                    self.reacquisitions += 1;
                    debug!(camera = %self.camera, frame = self.counter, "target reacquired");

                    return Ok(Some((tracker, frame)));
                }
                None => warn!(camera = %self.camera, "tracker rejected the selection, asking again"),
            }
        }
    }

    /// Operator-triggered re-selection while tracking. An empty or rejected
    /// box keeps the current tracker.
    fn reselect(&mut self, frame: &F, tracker: &mut Box<dyn VisualTracker<F>>) -> Result<()> {
        let bbox = self.prompt(frame, SelectReason::Manual, self.cfg.reselect_scale)?;

        if bbox.is_no_selection() {
            return Ok(());
        }

        match self.build_tracker(frame, bbox)? {
            Some(fresh) => {
                *tracker = fresh;
                self.reacquisitions += 1;
            }
            None => warn!(camera = %self.camera, "manual selection rejected, keeping tracker"),
        }

        Ok(())
    }

    /// Asks the operator for a box on a preview of `frame` and maps it back
    /// to full resolution.
    fn prompt(&mut self, frame: &F, reason: SelectReason, scale: f32) -> Result<BBox<Ltwh>> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled { camera: self.camera });
        }

        let preview = frame.downscale(scale)?;
        let bbox = self.operator.select(&preview, reason)?;
        self.prompts += 1;

        if bbox.is_no_selection() {
            Ok(bbox)
        } else {
            Ok(bbox.scaled(1.0 / scale))
        }
    }

    /// Always a brand new tracker instance; `None` if it refuses the box.
    fn build_tracker(&self, frame: &F, bbox: BBox<Ltwh>) -> Result<Option<Box<dyn VisualTracker<F>>>> {
        if !bbox.is_valid() {
            return Ok(None);
        }

        let mut tracker = self.trackers.create(self.cfg.tracker)?;

        if tracker.init(frame, bbox)? {
            Ok(Some(tracker))
        } else {
            Ok(None)
        }
    }

    fn next_frame(&mut self, source: &FrameSource<F>) -> Result<Option<F>> {
        match source.pull(&self.cancel) {
            Pull::Item(frame) => {
                self.counter += 1;
                Ok(Some(frame))
            }
            Pull::Exhausted => Ok(None),
            Pull::Cancelled => Err(Error::Cancelled { camera: self.camera }),
        }
    }

    #[inline]
    fn on_boundary(&self) -> bool {
        self.counter % self.cfg.sample_interval.max(1) == 0
    }

    #[inline]
    fn time(&self) -> f64 {
        self.counter as f64 / self.cfg.fps
    }

    fn enter(&mut self, state: SessionState) {
        debug!(camera = %self.camera, from = ?self.state, to = ?state, frame = self.counter, "session state");
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedBackend, ScriptedOperator, ScriptedTrackers, TestFrame};

    fn cfg() -> TrackingConfig {
        TrackingConfig {
            queue_capacity: 16,
            poll_interval_ms: 1,
            ..TrackingConfig::default()
        }
    }

    fn target() -> BBox<Ltwh> {
        BBox::ltwh(1000.0, 500.0, 40.0, 20.0)
    }

    fn run(
        frames: usize,
        trackers: &ScriptedTrackers,
        operator: &mut ScriptedOperator,
    ) -> Result<SessionReport> {
        let cfg = cfg();
        let backend = ScriptedBackend::new().with_video("v.mp4", frames);

        TrackingSession::<TestFrame, _>::new(Camera::First, &cfg, trackers, operator)
            .run_video(Path::new("v.mp4"), &backend)
    }

    #[test]
    fn backoff_escalates_and_holds() {
        let mut b = SkipBackoff::new(&[5, 15, 30, 60]);
        let seq: Vec<u64> = (0..7).map(|_| b.advance()).collect();
        assert_eq!(seq, vec![5, 15, 30, 60, 60, 60, 60]);

        b.reset();
        assert_eq!(b.current(), 5);
        assert_eq!(SkipBackoff::new(&[]).current(), 1);
    }

    #[test]
    fn samples_every_fifteenth_frame() {
        let trackers = ScriptedTrackers::always_ok();
        let mut operator = ScriptedOperator::new().answer(target());

        // selection frame + 100 updated frames
        let report = run(101, &trackers, &mut operator).unwrap();

        assert_eq!(report.samples.len(), 100 / 15);
        assert_eq!(report.frames_processed, 101);
        assert_eq!(report.frames_decoded, 101);
        assert_eq!(report.prompts, 1);

        for (i, s) in report.samples.iter().enumerate() {
            assert!((s.time - (15 * (i + 1)) as f64 / 30.0).abs() < 1e-12);
            assert!((s.x.unwrap() - 1020.0).abs() < 0.1);
            assert!((s.y.unwrap() - 510.0).abs() < 0.1);
        }
    }

    #[test]
    fn initial_prompt_uses_preview_and_rescales() {
        let trackers = ScriptedTrackers::always_ok();
        let mut operator = ScriptedOperator::new().answer(target());

        run(2, &trackers, &mut operator).unwrap();

        let (frame, reason, scale) = operator.prompts()[0];
        assert_eq!((frame, reason), (0, SelectReason::Initial));
        assert!((scale - 0.3).abs() < 1e-6);

        let seeded = trackers.seeded()[0];
        assert!((seeded.left() - 1000.0).abs() < 0.1);
        assert!((seeded.width() - 40.0).abs() < 0.1);
    }

    #[test]
    fn seed_skips_initial_prompt() {
        let cfg = cfg();
        let backend = ScriptedBackend::new().with_video("v.mp4", 31);
        let trackers = ScriptedTrackers::always_ok();
        let mut operator = ScriptedOperator::new();

        let report = TrackingSession::<TestFrame, _>::new(Camera::Second, &cfg, &trackers, &mut operator)
            .with_seed(target())
            .run_video(Path::new("v.mp4"), &backend)
            .unwrap();

        assert_eq!(report.prompts, 0);
        assert_eq!(report.samples.len(), 2);
        assert_eq!(trackers.seeded(), vec![target()]);
    }

    #[test]
    fn rejected_initial_selection_is_fatal() {
        let trackers = ScriptedTrackers::always_ok();
        let mut operator = ScriptedOperator::new();

        let err = run(10, &trackers, &mut operator).unwrap_err();
        assert!(matches!(err, Error::TrackerInit { camera: Camera::First }));
    }

    #[test]
    fn lost_target_rebuilds_tracker_on_current_frame() {
        let trackers = ScriptedTrackers::failing_on(|frame| frame == 20);
        let mut operator = ScriptedOperator::new().answer(target()).answer(target());

        let report = run(61, &trackers, &mut operator).unwrap();

        assert_eq!(trackers.created(), 2);
        assert_eq!(report.reacquisitions, 1);
        assert_eq!(operator.prompts()[1].0, 20);
        assert_eq!(operator.prompts()[1].1, SelectReason::Lost);
        // frames 15, 30, 45, 60 all tracked
        assert_eq!(report.samples.len(), 4);
        assert!(report.samples.iter().all(|s| !s.is_gap()));
    }

    #[test]
    fn skip_backoff_reprompts_and_marks_gaps() {
        let trackers = ScriptedTrackers::failing_on(|frame| frame >= 10);
        let mut operator = ScriptedOperator::new().answer(target());

        // lost on frame 10, then prompts at 10, 15, 30, 60, 120, 180, 240
        let report = run(250, &trackers, &mut operator).unwrap();

        let lost: Vec<usize> = operator
            .prompts()
            .iter()
            .filter(|p| p.1 == SelectReason::Lost)
            .map(|p| p.0)
            .collect();
        assert_eq!(lost, vec![10, 15, 30, 60, 120, 180, 240]);

        let gaps: Vec<f64> = report.samples.iter().filter(|s| s.is_gap()).map(|s| s.time).collect();
        let expected: Vec<f64> = (1..=16).map(|k| (15 * k) as f64 / 30.0).collect();
        assert_eq!(gaps, expected);
        assert_eq!(report.samples.len(), 249 / 15);
    }

    #[test]
    fn exhaustion_while_skipping_ends_session() {
        let trackers = ScriptedTrackers::failing_on(|frame| frame >= 3);
        let mut operator = ScriptedOperator::new().answer(target());

        let report = run(12, &trackers, &mut operator).unwrap();

        // prompts at 3 and 8, the 15-frame skip runs off the end
        assert_eq!(report.prompts, 3);
        assert!(report.samples.is_empty());
        assert_eq!(report.frames_processed, 12);
    }

    #[test]
    fn manual_reselect_rebuilds_tracker() {
        let trackers = ScriptedTrackers::always_ok();
        let moved = BBox::ltwh(2000.0, 900.0, 40.0, 20.0);
        let mut operator = ScriptedOperator::new()
            .answer(target())
            .answer(moved)
            .reselect_on(7);

        let report = run(31, &trackers, &mut operator).unwrap();

        assert_eq!(trackers.created(), 2);
        assert_eq!(report.reacquisitions, 1);
        let (frame, reason, scale) = operator.prompts()[1];
        assert_eq!((frame, reason), (7, SelectReason::Manual));
        assert!((scale - 0.4).abs() < 1e-6);
        assert!((report.samples[0].x.unwrap() - 2020.0).abs() < 0.1);
    }

    #[test]
    fn reselect_honoured_on_reacquired_frame() {
        let trackers = ScriptedTrackers::failing_on(|frame| frame == 20);
        let moved = BBox::ltwh(2000.0, 900.0, 40.0, 20.0);
        let mut operator = ScriptedOperator::new()
            .answer(target())
            .answer(target())
            .answer(moved)
            .reselect_on(20);

        let report = run(31, &trackers, &mut operator).unwrap();

        assert_eq!(trackers.created(), 3);
        assert_eq!(report.reacquisitions, 2);
        let (frame, reason, scale) = operator.prompts()[2];
        assert_eq!((frame, reason), (20, SelectReason::Manual));
        assert!((scale - 0.4).abs() < 1e-6);
        // frame 30 is tracked from the manual box
        assert!((report.samples[1].x.unwrap() - 2020.0).abs() < 0.1);
    }

    #[test]
    fn decode_error_ends_session_normally() {
        let cfg = cfg();
        let backend = ScriptedBackend::new().with_broken_video("b.mp4", 46);
        let trackers = ScriptedTrackers::always_ok();
        let mut operator = ScriptedOperator::new();

        let report = TrackingSession::<TestFrame, _>::new(Camera::First, &cfg, &trackers, &mut operator)
            .with_seed(target())
            .run_video(Path::new("b.mp4"), &backend)
            .unwrap();

        // frames 15, 30 and 45 made it out before the bad one
        assert_eq!(report.samples.len(), 3);
        assert_eq!(report.frames_decoded, 46);
        assert_eq!(report.frames_processed, 46);
    }

    #[test]
    fn unattended_run_records_gaps_after_loss() {
        let cfg = cfg();
        let backend = ScriptedBackend::new().with_video("v.mp4", 91);
        let trackers = ScriptedTrackers::failing_on(|frame| frame >= 40);
        let mut operator = crate::operator::Unattended;

        let session = TrackingSession::<TestFrame, _>::new(Camera::First, &cfg, &trackers, &mut operator)
            .with_seed(target());
        assert_eq!(session.state(), SessionState::AwaitingSelection);

        let report = session.run_video(Path::new("v.mp4"), &backend).unwrap();

        let gaps: Vec<bool> = report.samples.iter().map(|s| s.is_gap()).collect();
        assert_eq!(gaps, vec![false, false, true, true, true, true]);
        assert_eq!(report.reacquisitions, 0);
    }

    #[test]
    fn cancelled_session_stops_at_prompt() {
        let cfg = cfg();
        let backend = ScriptedBackend::new().with_video("v.mp4", 50);
        let trackers = ScriptedTrackers::always_ok();
        let mut operator = ScriptedOperator::new().answer(target());
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = TrackingSession::<TestFrame, _>::new(Camera::First, &cfg, &trackers, &mut operator)
            .with_cancel(cancel)
            .run_video(Path::new("v.mp4"), &backend)
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled { camera: Camera::First }));
    }
}
