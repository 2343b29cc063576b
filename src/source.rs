use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::frame_queue::{self, Pull, QueueReader, QueueWriter};
use crate::{CancelToken, Camera};

/// Sequential decoder over one video file.
pub trait VideoDecoder<F: Frame>: Send + 'static {
    /// `Ok(None)` marks the normal end of the stream.
    fn read(&mut self) -> Result<Option<F>>;
}

/// Opens decoders for video paths.
pub trait VideoBackend<F: Frame>: Sync {
    type Decoder: VideoDecoder<F>;

    /// Fails with `Error::VideoNotPresent` when the file cannot be opened.
    fn open(&self, camera: Camera, path: &Path) -> Result<Self::Decoder>;
}

/// Decodes a video on a background thread into a bounded queue.
#[derive(Debug)]
pub struct FrameSource<F: Frame> {
    camera: Camera,
    path: PathBuf,
    frames: QueueReader<F>,
    reader: thread::JoinHandle<usize>,
}

impl<F: Frame> FrameSource<F> {
    /// Opens `path` through `backend` and starts the reader thread.
    pub fn open<B: VideoBackend<F>>(
        camera: Camera,
        path: &Path,
        backend: &B,
        capacity: usize,
        poll: Duration,
    ) -> Result<Self> {
        let decoder = backend.open(camera, path)?;

        Self::spawn(camera, path, decoder, capacity, poll)
    }

    /// Starts reading from an already opened decoder. The first frame is
    /// decoded on the calling thread so an unreadable video fails here.
    pub fn spawn<D: VideoDecoder<F>>(
        camera: Camera,
        path: &Path,
        mut decoder: D,
        capacity: usize,
        poll: Duration,
    ) -> Result<Self> {
        let first = match decoder.read() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                return Err(Error::VideoCorrupted {
                    camera,
                    path: path.to_path_buf(),
                })
            }
            Err(err) => {
                warn!(%camera, error = %err, "first frame failed to decode");

                return Err(Error::VideoCorrupted {
                    camera,
                    path: path.to_path_buf(),
                });
            }
        };

        let (writer, frames) = frame_queue::bounded(capacity, poll);
        writer.push(first);

        let reader = thread::Builder::new()
            .name(format!("{}-reader", camera.slug()))
            .spawn(move || read_loop(camera, decoder, writer))?;

        info!(%camera, path = %path.display(), capacity, "frame source started");

        Ok(Self {
            camera,
            path: path.to_path_buf(),
            frames,
            reader,
        })
    }

    #[inline]
    pub fn camera(&self) -> Camera {
        self.camera
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn pull(&self, cancel: &CancelToken) -> Pull<F> {
        self.frames.pull(cancel)
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.frames.is_exhausted()
    }

    /// Stops consuming and waits for the reader. Returns the number of
    /// frames it decoded.
    pub fn close(self) -> usize {
        let Self {
            camera,
            frames,
            reader,
            ..
        } = self;

        // unblocks a producer waiting on a full queue
        drop(frames);

        match reader.join() {
            Ok(total) => total,
            Err(_) => {
                warn!(%camera, "reader thread panicked");
                0
            }
        }
    }
}

fn read_loop<F: Frame, D: VideoDecoder<F>>(
    camera: Camera,
    mut decoder: D,
    writer: QueueWriter<F>,
) -> usize {
    let mut total = 1;

    loop {
        match decoder.read() {
            Ok(Some(frame)) => {
                if !writer.push(frame) {
                    debug!(%camera, "consumer went away, stopping reader");
                    break;
                }

                total += 1;
            }
            Ok(None) => break,
            Err(err) => {
                // the stream ends at the first unreadable frame
                warn!(%camera, error = %err, frame = total, "decode failed, ending stream");
                break;
            }
        }
    }

    writer.finish();
    info!(%camera, frames = total, "done reading video");

    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedBackend, TestFrame};

    fn poll() -> Duration {
        Duration::from_millis(2)
    }

    #[test]
    fn delivers_every_frame_in_order() {
        let backend = ScriptedBackend::new().with_video("a.mp4", 250);
        let source =
            FrameSource::open(Camera::First, Path::new("a.mp4"), &backend, 8, poll()).unwrap();
        let cancel = CancelToken::new();

        let mut seen = Vec::new();
        while let Pull::Item(frame) = source.pull(&cancel) {
            seen.push(frame.index);
        }

        assert_eq!(seen, (0..250).collect::<Vec<_>>());
        assert!(source.is_exhausted());
        assert_eq!(source.close(), 250);
    }

    #[test]
    fn missing_file_is_not_present() {
        let backend = ScriptedBackend::new();
        let err = FrameSource::<TestFrame>::open(
            Camera::Second,
            Path::new("nope.mp4"),
            &backend,
            8,
            poll(),
        )
        .unwrap_err();

        assert!(matches!(err, Error::VideoNotPresent { camera: Camera::Second, .. }));
        assert!(err.to_string().contains("nope.mp4"));
    }

    #[test]
    fn empty_video_is_corrupted() {
        let backend = ScriptedBackend::new().with_video("empty.mp4", 0);
        let err = FrameSource::<TestFrame>::open(
            Camera::First,
            Path::new("empty.mp4"),
            &backend,
            8,
            poll(),
        )
        .unwrap_err();

        assert!(matches!(err, Error::VideoCorrupted { camera: Camera::First, .. }));
    }

    #[test]
    fn early_close_releases_blocked_reader() {
        let backend = ScriptedBackend::new().with_video("long.mp4", 10_000);
        let source =
            FrameSource::open(Camera::First, Path::new("long.mp4"), &backend, 2, poll()).unwrap();
        let cancel = CancelToken::new();

        assert!(matches!(source.pull(&cancel), Pull::Item(_)));
        assert!(source.close() < 10_000);
    }
}
