//! Runs the two camera sessions of a flight and collects both outcomes.

use std::panic;
use std::path::Path;
use std::thread;

use tracing::{error, info};

use crate::bbox::{BBox, Ltwh};
use crate::config::{Config, FailurePolicy};
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::operator::Operator;
use crate::session::{SessionReport, TrackingSession};
use crate::source::VideoBackend;
use crate::tracker::TrackerFactory;
use crate::{CancelToken, Camera};

/// Outcome of both sessions. Either side may have failed independently.
#[derive(Debug)]
pub struct DualTrack {
    pub first: Result<SessionReport>,
    pub second: Result<SessionReport>,
}

impl DualTrack {
    /// Both reports, or the error that stopped the flight. A sibling that
    /// was only cancelled because of it is not the reported cause.
    pub fn both(self) -> Result<(SessionReport, SessionReport)> {
        match (self.first, self.second) {
            (Ok(a), Ok(b)) => Ok((a, b)),
            (Err(Error::Cancelled { .. }), Err(err)) if !matches!(err, Error::Cancelled { .. }) => {
                Err(err)
            }
            (Err(err), _) | (_, Err(err)) => Err(err),
        }
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.first.is_ok() && self.second.is_ok()
    }
}

pub struct Coordinator<'a, F: Frame> {
    cfg: &'a Config,
    trackers: &'a dyn TrackerFactory<F>,
    cancel: CancelToken,
    seeds: [Option<BBox<Ltwh>>; 2],
}

impl<'a, F: Frame> Coordinator<'a, F> {
    pub fn new(cfg: &'a Config, trackers: &'a dyn TrackerFactory<F>) -> Self {
        Self {
            cfg,
            trackers,
            cancel: CancelToken::new(),
            seeds: [None, None],
        }
    }

    /// Token shared by both sessions. Under `FailurePolicy::AbortBoth` a
    /// fatal error in one session cancels it.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Initial boxes replacing the operator's first selection.
    pub fn with_seeds(mut self, first: Option<BBox<Ltwh>>, second: Option<BBox<Ltwh>>) -> Self {
        self.seeds = [first, second];
        self
    }

    #[inline]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Tracks `video1` with `op1` as camera 1 and `video2` with `op2` as
    /// camera 2, concurrently or one after the other as configured.
    pub fn run<B, O1, O2>(
        &self,
        backend: &B,
        video1: &Path,
        video2: &Path,
        op1: &mut O1,
        op2: &mut O2,
    ) -> DualTrack
    where
        B: VideoBackend<F>,
        O1: Operator<F> + Send,
        O2: Operator<F> + Send,
    {
        info!(
            video1 = %video1.display(),
            video2 = %video2.display(),
            concurrent = self.cfg.coordinator.concurrent,
            policy = ?self.cfg.coordinator.failure_policy,
            "tracking flight"
        );

        let result = if self.cfg.coordinator.concurrent {
            self.run_concurrent(backend, video1, video2, op1, op2)
        } else {
            self.run_sequential(backend, video1, video2, op1, op2)
        };

        info!(
            first_ok = result.first.is_ok(),
            second_ok = result.second.is_ok(),
            "flight tracking finished"
        );

        result
    }

    fn run_sequential<B, O1, O2>(
        &self,
        backend: &B,
        video1: &Path,
        video2: &Path,
        op1: &mut O1,
        op2: &mut O2,
    ) -> DualTrack
    where
        B: VideoBackend<F>,
        O1: Operator<F>,
        O2: Operator<F>,
    {
        let first = self.track(Camera::First, video1, backend, op1);

        let second = if first.is_err() && self.cfg.coordinator.failure_policy == FailurePolicy::AbortBoth {
            Err(Error::Cancelled {
                camera: Camera::Second,
            })
        } else {
            self.track(Camera::Second, video2, backend, op2)
        };

        DualTrack { first, second }
    }

    fn run_concurrent<B, O1, O2>(
        &self,
        backend: &B,
        video1: &Path,
        video2: &Path,
        op1: &mut O1,
        op2: &mut O2,
    ) -> DualTrack
    where
        B: VideoBackend<F>,
        O1: Operator<F> + Send,
        O2: Operator<F> + Send,
    {
        thread::scope(|s| {
            let spawned = thread::Builder::new()
                .name(format!("{}-session", Camera::Second.slug()))
                .spawn_scoped(s, || self.track(Camera::Second, video2, backend, op2));

            // the first camera runs on the calling thread
            let first = self.track(Camera::First, video1, backend, op1);

            let second = match spawned {
                Ok(handle) => handle.join().unwrap_or_else(|p| panic::resume_unwind(p)),
                Err(err) => Err(Error::Io(err)),
            };

            DualTrack { first, second }
        })
    }

    fn track<B, O>(&self, camera: Camera, video: &Path, backend: &B, operator: &mut O) -> Result<SessionReport>
    where
        B: VideoBackend<F>,
        O: Operator<F>,
    {
        let mut session = TrackingSession::new(camera, &self.cfg.tracking, self.trackers, operator)
            .with_cancel(self.cancel.clone());

        if let Some(seed) = self.seeds[camera.index()] {
            session = session.with_seed(seed);
        }

        let outcome = session.run_video(video, backend);

        if let Err(err) = &outcome {
            error!(%camera, error = %err, "session failed");

            if self.cfg.coordinator.failure_policy == FailurePolicy::AbortBoth
                && !matches!(err, Error::Cancelled { .. })
            {
                self.cancel.cancel();
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedBackend, ScriptedOperator, ScriptedTrackers, TestFrame};

    fn cfg(concurrent: bool, policy: FailurePolicy) -> Config {
        let mut cfg = Config::default();
        cfg.tracking.queue_capacity = 8;
        cfg.tracking.poll_interval_ms = 1;
        cfg.coordinator.concurrent = concurrent;
        cfg.coordinator.failure_policy = policy;
        cfg
    }

    fn operator() -> ScriptedOperator {
        ScriptedOperator::new().answer(BBox::ltwh(100.0, 100.0, 30.0, 30.0))
    }

    #[test]
    fn tracks_both_cameras() {
        for concurrent in [true, false] {
            let cfg = cfg(concurrent, FailurePolicy::ContinuePartial);
            let backend = ScriptedBackend::new()
                .with_video("one.mp4", 61)
                .with_video("two.mp4", 46);
            let trackers = ScriptedTrackers::always_ok();
            let (mut op1, mut op2) = (operator(), operator());

            let (a, b) = Coordinator::<TestFrame>::new(&cfg, &trackers)
                .run(&backend, Path::new("one.mp4"), Path::new("two.mp4"), &mut op1, &mut op2)
                .both()
                .unwrap();

            assert_eq!(a.camera, Camera::First);
            assert_eq!(b.camera, Camera::Second);
            assert_eq!(a.samples.len(), 4);
            assert_eq!(b.samples.len(), 3);
            assert_eq!(trackers.created(), 2);
        }
    }

    #[test]
    fn partial_result_survives_missing_video() {
        let cfg = cfg(true, FailurePolicy::ContinuePartial);
        let backend = ScriptedBackend::new().with_video("two.mp4", 31);
        let trackers = ScriptedTrackers::always_ok();
        let (mut op1, mut op2) = (operator(), operator());

        let result = Coordinator::<TestFrame>::new(&cfg, &trackers).run(
            &backend,
            Path::new("missing.mp4"),
            Path::new("two.mp4"),
            &mut op1,
            &mut op2,
        );

        assert!(matches!(
            result.first,
            Err(Error::VideoNotPresent { camera: Camera::First, .. })
        ));
        assert_eq!(result.second.as_ref().unwrap().samples.len(), 2);
        assert!(!result.is_complete());
    }

    #[test]
    fn abort_both_cancels_sibling() {
        let cfg = cfg(true, FailurePolicy::AbortBoth);
        let backend = ScriptedBackend::new().with_video("two.mp4", 5_000_000);
        let trackers = ScriptedTrackers::always_ok();
        let (mut op1, mut op2) = (operator(), operator());

        let result = Coordinator::<TestFrame>::new(&cfg, &trackers).run(
            &backend,
            Path::new("missing.mp4"),
            Path::new("two.mp4"),
            &mut op1,
            &mut op2,
        );

        assert!(matches!(
            result.second,
            Err(Error::Cancelled { camera: Camera::Second })
        ));
        assert!(matches!(
            result.both(),
            Err(Error::VideoNotPresent { camera: Camera::First, .. })
        ));
    }

    #[test]
    fn abort_both_skips_second_when_sequential() {
        let cfg = cfg(false, FailurePolicy::AbortBoth);
        let backend = ScriptedBackend::new().with_video("two.mp4", 31);
        let trackers = ScriptedTrackers::always_ok();
        let (mut op1, mut op2) = (operator(), operator());

        let result = Coordinator::<TestFrame>::new(&cfg, &trackers).run(
            &backend,
            Path::new("missing.mp4"),
            Path::new("two.mp4"),
            &mut op1,
            &mut op2,
        );

        assert!(result.second.is_err());
        assert!(op2.prompts().is_empty());
    }

    #[test]
    fn seeds_replace_initial_prompts() {
        let cfg = cfg(false, FailurePolicy::ContinuePartial);
        let backend = ScriptedBackend::new()
            .with_video("one.mp4", 16)
            .with_video("two.mp4", 16);
        let trackers = ScriptedTrackers::always_ok();
        let seed = BBox::ltwh(10.0, 10.0, 8.0, 8.0);
        let (mut op1, mut op2) = (ScriptedOperator::new(), ScriptedOperator::new());

        let result = Coordinator::<TestFrame>::new(&cfg, &trackers)
            .with_seeds(Some(seed), Some(seed))
            .run(&backend, Path::new("one.mp4"), Path::new("two.mp4"), &mut op1, &mut op2);

        assert!(result.is_complete());
        assert_eq!(op1.prompts().len() + op2.prompts().len(), 0);
    }
}
