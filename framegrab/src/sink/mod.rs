mod display;
mod file;

pub use display::{blit_yv12, Display, DisplaySink, SURFACE_PLANE_ORDER};
pub use file::{FileSink, ImageFormat};

use crate::{error::SinkError, frame::PixelFormat, VideoFrame};

/// Final destination of converted frames.
pub trait FrameSink {
    /// Layout frames must be converted to before `consume`.
    fn pixel_format(&self) -> PixelFormat;

    fn consume(&mut self, frame: VideoFrame, sequence: u64) -> Result<(), SinkError>;

    /// Polled once per loop iteration; `true` ends the run without draining.
    fn quit_requested(&mut self) -> bool {
        false
    }
}
