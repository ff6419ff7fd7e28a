// Viewport mapping: normalized landmark space -> on-screen pixels under "cover" fit.
// The video element fills its box and crops overflow; a selfie preview is mirrored.
// Mirroring happens after the cover projection, about the viewport's horizontal centre.

use crate::classifier::INDEX_TIP;
use crate::error::{Result, TrialError};
use crate::types::*;

/// Maps landmarks from one source image into one destination viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportMapper {
    viewport: ScreenRect,
    mirror: bool,
    /// Source pixels -> viewport pixels.
    scale: f32,
    /// Rendered image size after scaling (at least the viewport size).
    rendered_width: f32,
    rendered_height: f32,
    /// Crop offset of the rendered image relative to the viewport origin (<= 0).
    offset_x: f32,
    offset_y: f32,
}

impl ViewportMapper {
    pub fn new(source_width: f32, source_height: f32, viewport: ScreenRect, mirror: bool) -> Result<Self> {
        if !(source_width > 0.0 && source_height > 0.0) {
            return Err(TrialError::InvalidConfig(format!(
                "source image must have a positive size, got {}x{}",
                source_width, source_height
            )));
        }
        if !(viewport.width > 0.0 && viewport.height > 0.0) {
            return Err(TrialError::InvalidConfig(format!(
                "viewport must have a positive size, got {}x{}",
                viewport.width, viewport.height
            )));
        }

        let scale = (viewport.width / source_width).max(viewport.height / source_height);
        let rendered_width = source_width * scale;
        let rendered_height = source_height * scale;

        Ok(ViewportMapper {
            viewport,
            mirror,
            scale,
            rendered_width,
            rendered_height,
            offset_x: (viewport.width - rendered_width) / 2.0,
            offset_y: (viewport.height - rendered_height) / 2.0,
        })
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Project a normalized landmark into viewport pixels.
    pub fn to_viewport(&self, point: &LandmarkPoint) -> ScreenPoint {
        let x = self.viewport.x + self.offset_x + point.x * self.rendered_width;
        let y = self.viewport.y + self.offset_y + point.y * self.rendered_height;
        ScreenPoint::new(self.reflect_x(x), y)
    }

    /// Inverse of `to_viewport`. Points outside the visible crop map outside [0, 1].
    pub fn to_normalized(&self, point: ScreenPoint) -> LandmarkPoint {
        let x = self.reflect_x(point.x);
        LandmarkPoint::new(
            (x - self.viewport.x - self.offset_x) / self.rendered_width,
            (point.y - self.viewport.y - self.offset_y) / self.rendered_height,
        )
    }

    /// Whether a projected point lands inside the visible viewport.
    pub fn is_visible(&self, point: ScreenPoint) -> bool {
        self.viewport.contains(point)
    }

    /// Index fingertip of a hand frame, projected into viewport pixels.
    pub fn map_fingertip(&self, frame: &LandmarkFrame) -> Option<ScreenPoint> {
        fingertip(frame).map(|tip| self.to_viewport(tip))
    }

    fn reflect_x(&self, x: f32) -> f32 {
        if self.mirror {
            let center = self.viewport.x + self.viewport.width / 2.0;
            2.0 * center - x
        } else {
            x
        }
    }
}

/// The tracked pointer landmark: tip of the index finger.
pub fn fingertip(frame: &LandmarkFrame) -> Option<&LandmarkPoint> {
    frame.point(INDEX_TIP)
}
