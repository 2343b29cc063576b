//! OpenCV implementations of the video, tracker and operator capabilities.

use std::path::Path;

use opencv::{
    core::{self, Mat, Ptr, Rect, Scalar},
    highgui, imgproc,
    prelude::*,
    tracking::{TrackerCSRT, TrackerCSRT_Params, TrackerKCF, TrackerKCF_Params},
    videoio::{self, VideoCapture},
};
use tracing::debug;

use crate::bbox::{BBox, Ltwh};
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::operator::{Operator, OperatorAction, SelectReason};
use crate::source::{VideoBackend, VideoDecoder};
use crate::sync::LightWindow;
use crate::tracker::{TrackerFactory, TrackerKind, VisualTracker};
use crate::Camera;

/// Opens video files with `cv::VideoCapture`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CvBackend;

impl VideoBackend<Mat> for CvBackend {
    type Decoder = CvDecoder;

    fn open(&self, camera: Camera, path: &Path) -> Result<CvDecoder> {
        let not_present = || Error::VideoNotPresent {
            camera,
            path: path.to_path_buf(),
        };

        let name = path.to_str().ok_or_else(not_present)?;
        let capture = VideoCapture::from_file(name, videoio::CAP_ANY).map_err(|_| not_present())?;

        if !capture.is_opened()? {
            return Err(not_present());
        }

        debug!(%camera, path = %path.display(), "video opened");

        Ok(CvDecoder { capture })
    }
}

pub struct CvDecoder {
    capture: VideoCapture,
}

impl VideoDecoder<Mat> for CvDecoder {
    fn read(&mut self) -> Result<Option<Mat>> {
        let mut frame = Mat::default();

        if !self.capture.read(&mut frame)? || frame.empty() {
            return Ok(None);
        }

        Ok(Some(frame))
    }
}

#[inline]
fn to_rect(bbox: &BBox<Ltwh>) -> Rect {
    Rect::new(
        bbox.left().round() as i32,
        bbox.top().round() as i32,
        bbox.width().round() as i32,
        bbox.height().round() as i32,
    )
}

#[inline]
fn from_rect(rect: Rect) -> BBox<Ltwh> {
    BBox::ltwh(rect.x as f32, rect.y as f32, rect.width as f32, rect.height as f32)
}

enum CvTracker {
    Kcf(Ptr<TrackerKCF>),
    Csrt(Ptr<TrackerCSRT>),
}

impl VisualTracker<Mat> for CvTracker {
    fn init(&mut self, frame: &Mat, bbox: BBox<Ltwh>) -> Result<bool> {
        if !bbox.fits(Frame::dims(frame)) {
            return Ok(false);
        }

        let rect = to_rect(&bbox);
        let seeded = match self {
            CvTracker::Kcf(t) => t.init(frame, rect),
            CvTracker::Csrt(t) => t.init(frame, rect),
        };

        // OpenCV reports a refused box as an exception
        Ok(seeded.is_ok())
    }

    fn update(&mut self, frame: &Mat) -> Result<(bool, BBox<Ltwh>)> {
        let mut rect = Rect::default();

        let ok = match self {
            CvTracker::Kcf(t) => t.update(frame, &mut rect)?,
            CvTracker::Csrt(t) => t.update(frame, &mut rect)?,
        };

        Ok((ok, from_rect(rect)))
    }
}

/// Builds OpenCV contrib trackers.
#[derive(Debug, Default, Clone, Copy)]
pub struct CvTrackers;

impl TrackerFactory<Mat> for CvTrackers {
    fn create(&self, kind: TrackerKind) -> Result<Box<dyn VisualTracker<Mat>>> {
        let tracker = match kind {
            TrackerKind::Kcf => CvTracker::Kcf(TrackerKCF::create(TrackerKCF_Params::default()?)?),
            TrackerKind::Csrt => CvTracker::Csrt(TrackerCSRT::create(&TrackerCSRT_Params::default()?)?),
        };

        Ok(Box::new(tracker))
    }
}

/// Operator working through HighGUI windows. Selection uses `selectROI`,
/// pressing `r` on the tracking window asks for a new box.
pub struct HighguiOperator {
    window: String,
    display_scale: f32,
}

impl HighguiOperator {
    pub fn new(camera: Camera, display_scale: f32) -> Self {
        Self {
            window: format!("Tracking {}", camera),
            display_scale,
        }
    }
}

impl Operator<Mat> for HighguiOperator {
    fn select(&mut self, preview: &Mat, reason: SelectReason) -> Result<BBox<Ltwh>> {
        let title = match reason {
            SelectReason::Initial => format!("{}: select the drone", self.window),
            SelectReason::Lost => format!("{}: target lost, reselect or press c", self.window),
            SelectReason::Manual => format!("{}: reselect the drone", self.window),
        };

        let rect = highgui::select_roi_def(&title, preview)?;
        highgui::destroy_window(&title)?;

        Ok(from_rect(rect))
    }

    fn present(&mut self, frame: &Mat, bbox: Option<&BBox<Ltwh>>) -> Result<OperatorAction> {
        let mut shown = frame.downscale(self.display_scale)?;

        if let Some(bbox) = bbox {
            imgproc::rectangle(
                &mut shown,
                to_rect(&bbox.scaled(self.display_scale)),
                Scalar::new(255.0, 0.0, 0.0, 0.0),
                2,
                imgproc::LINE_8,
                0,
            )?;
        }

        highgui::imshow(&self.window, &shown)?;

        if highgui::wait_key(1)? == b'r' as i32 {
            Ok(OperatorAction::Reselect)
        } else {
            Ok(OperatorAction::Continue)
        }
    }
}

/// True when the ground light is visible: enough near-white pixels in HSV
/// space, but not a saturated frame.
pub fn is_light_on(frame: &Mat, window: &LightWindow) -> Result<bool> {
    let mut hsv = Mat::default();
    imgproc::cvt_color_def(frame, &mut hsv, imgproc::COLOR_BGR2HSV)?;

    let mut mask = Mat::default();
    core::in_range(
        &hsv,
        &Scalar::new(0.0, 0.0, 20.0, 0.0),
        &Scalar::new(5.0, 2.0, 255.0, 0.0),
        &mut mask,
    )?;

    let lit = core::count_non_zero(&mask)?;

    Ok(window.contains(lit.max(0) as u64))
}
