use crate::overlay::display::DisplayId;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransformError {
    /// Fatal to the current frame only: the overlay keeps its previous render.
    #[error("no display contains the pointer and no primary display is available")]
    NoDisplayAvailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("screen capture permission was denied")]
    PermissionDenied,
    #[error("{0} is no longer available for capture")]
    DisplayUnavailable(DisplayId),
    #[error("capture backend failed: {0}")]
    Backend(String),
}

impl CaptureError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}
