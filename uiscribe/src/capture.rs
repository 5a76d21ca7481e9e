//! Screen capture behind a trait so the annotator is testable headless.

use crate::errors::AutomationError;
use crate::geometry::Rect;
use image::RgbaImage;

/// Produces raw screen pixels for the annotator.
pub trait ScreenCapture: Send + Sync {
    /// Capture the whole primary screen, or a clamped region of it.
    fn capture(&self, region: Option<Rect>) -> Result<RgbaImage, AutomationError>;

    /// Primary screen dimensions.
    fn screen_size(&self) -> Result<(u32, u32), AutomationError>;
}

/// `xcap`-backed capture of the primary monitor.
#[derive(Debug, Default)]
pub struct MonitorCapture;

impl MonitorCapture {
    pub fn new() -> Self {
        Self
    }

    fn primary_monitor() -> Result<xcap::Monitor, AutomationError> {
        let monitors = xcap::Monitor::all()
            .map_err(|e| AutomationError::CaptureError(format!("Failed to list monitors: {e}")))?;
        monitors
            .into_iter()
            .find(|m| m.is_primary().unwrap_or(false))
            .ok_or_else(|| AutomationError::CaptureError("No primary monitor found".to_string()))
    }
}

impl ScreenCapture for MonitorCapture {
    fn capture(&self, region: Option<Rect>) -> Result<RgbaImage, AutomationError> {
        let monitor = Self::primary_monitor()?;
        let full = monitor.capture_image().map_err(|e| {
            AutomationError::CaptureError(format!("Failed to capture monitor: {e}"))
        })?;

        let Some(region) = region else {
            return Ok(full);
        };

        let screen = Rect::new(0, 0, full.width() as i32, full.height() as i32);
        let region = region.clamp_to(screen);
        if region.width() <= 0 || region.height() <= 0 {
            return Err(AutomationError::InvalidArgument(format!(
                "Degenerate capture region: {region:?}"
            )));
        }

        Ok(image::imageops::crop_imm(
            &full,
            region.left as u32,
            region.top as u32,
            region.width() as u32,
            region.height() as u32,
        )
        .to_image())
    }

    fn screen_size(&self) -> Result<(u32, u32), AutomationError> {
        let monitor = Self::primary_monitor()?;
        let width = monitor
            .width()
            .map_err(|e| AutomationError::CaptureError(format!("Failed to get width: {e}")))?;
        let height = monitor
            .height()
            .map_err(|e| AutomationError::CaptureError(format!("Failed to get height: {e}")))?;
        Ok((width, height))
    }
}
