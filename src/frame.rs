use crate::error::Error;

/// One decoded video raster. Never mutated once produced.
pub trait Frame: Send + Sized + 'static {
    /// (width, height) in pixels
    fn dims(&self) -> (u32, u32);

    /// Copy resized by `factor` for display to an operator.
    fn downscale(&self, factor: f32) -> Result<Self, Error>;
}

#[cfg(feature = "opencv")]
impl Frame for opencv::core::Mat {
    fn dims(&self) -> (u32, u32) {
        use opencv::prelude::*;

        (self.cols().max(0) as u32, self.rows().max(0) as u32)
    }

    fn downscale(&self, factor: f32) -> Result<Self, Error> {
        let mut resized = opencv::core::Mat::default();

        opencv::imgproc::resize(
            self,
            &mut resized,
            opencv::core::Size::default(),
            factor as f64,
            factor as f64,
            opencv::imgproc::INTER_AREA,
        )?;

        Ok(resized)
    }
}
