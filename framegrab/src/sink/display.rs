use sdl2::{
    event::Event,
    keyboard::Keycode,
    pixels::PixelFormatEnum,
    rect::Rect,
    render::{Texture, TextureCreator, WindowCanvas},
    video::WindowContext,
    EventPump, Sdl,
};
use tracing::debug;

use super::FrameSink;
use crate::{error::SinkError, frame::PixelFormat, VideoFrame};

/// Decoder plane feeding each YV12 surface slot. YV12 stores V before U,
/// the reverse of libav's planar YUV order.
pub const SURFACE_PLANE_ORDER: [usize; 3] = [0, 2, 1];

/// An SDL window sized to the video, plus its event queue.
pub struct Display {
    _sdl: Sdl,
    canvas: WindowCanvas,
    texture_creator: TextureCreator<WindowContext>,
    event_pump: EventPump,
    width: u32,
    height: u32,
}

impl Display {
    pub fn open(title: &str, width: usize, height: usize) -> Result<Self, SinkError> {
        let (width, height) = match (u32::try_from(width), u32::try_from(height)) {
            (Ok(width), Ok(height)) => (width, height),
            _ => {
                return Err(SinkError::Display(format!(
                    "{width}x{height} is too large for a window"
                )))
            }
        };
        let sdl_context = sdl2::init().map_err(SinkError::Display)?;
        let video_subsystem = sdl_context.video().map_err(SinkError::Display)?;
        let window = video_subsystem
            .window(title, width, height)
            .position_centered()
            .build()?;
        let canvas = window.into_canvas().build()?;
        let texture_creator = canvas.texture_creator();
        let event_pump = sdl_context.event_pump().map_err(SinkError::Display)?;
        debug!("opened {width}x{height} window");
        Ok(Self {
            _sdl: sdl_context,
            canvas,
            texture_creator,
            event_pump,
            width,
            height,
        })
    }

    pub fn sink(&mut self) -> Result<DisplaySink<'_>, SinkError> {
        let texture = self.texture_creator.create_texture_streaming(
            PixelFormatEnum::YV12,
            self.width,
            self.height,
        )?;
        Ok(DisplaySink {
            canvas: &mut self.canvas,
            event_pump: &mut self.event_pump,
            texture,
            rect: Rect::new(0, 0, self.width, self.height),
        })
    }
}

/// Presents each frame through a streaming YV12 texture.
pub struct DisplaySink<'t> {
    canvas: &'t mut WindowCanvas,
    event_pump: &'t mut EventPump,
    texture: Texture<'t>,
    rect: Rect,
}

impl FrameSink for DisplaySink<'_> {
    fn pixel_format(&self) -> PixelFormat {
        PixelFormat::Yuv420p
    }

    fn consume(&mut self, frame: VideoFrame, _sequence: u64) -> Result<(), SinkError> {
        check_surface_size(&frame, self.rect.width(), self.rect.height())?;
        self.texture
            .with_lock(None, |buffer, pitch| blit_yv12(&frame, buffer, pitch))
            .map_err(SinkError::Display)??;
        self.canvas.clear();
        self.canvas
            .copy(&self.texture, None, Some(self.rect))
            .map_err(SinkError::Display)?;
        self.canvas.present();
        Ok(())
    }

    fn quit_requested(&mut self) -> bool {
        self.event_pump.poll_iter().any(|event| {
            matches!(
                event,
                Event::Quit { .. }
                    | Event::KeyDown {
                        keycode: Some(Keycode::Escape),
                        ..
                    }
            )
        })
    }
}

/// The texture is sized once from the stream; every frame must match it.
fn check_surface_size(frame: &VideoFrame, width: u32, height: u32) -> Result<(), SinkError> {
    if (frame.width, frame.height) == (width as usize, height as usize) {
        return Ok(());
    }
    Err(SinkError::Display(format!(
        "{}x{} frame does not fit the {width}x{height} surface",
        frame.width, frame.height
    )))
}

/// Copies a planar YUV 4:2:0 frame into a locked YV12 buffer whose luma rows
/// are `pitch` bytes apart. Chroma rows use half the pitch, rounded up.
/// Fails without writing if `buffer` cannot hold every plane.
pub fn blit_yv12(frame: &VideoFrame, buffer: &mut [u8], pitch: usize) -> Result<(), SinkError> {
    let chroma_pitch = pitch.div_ceil(2);
    let chroma_rows = frame.height.div_ceil(2);
    let required = pitch * frame.height + 2 * chroma_pitch * chroma_rows;
    if buffer.len() < required {
        return Err(SinkError::Display(format!(
            "locked surface holds {} bytes, {}x{} frame needs {required}",
            buffer.len(),
            frame.width,
            frame.height
        )));
    }
    let mut offset = 0;
    for (slot, &plane) in SURFACE_PLANE_ORDER.iter().enumerate() {
        let (slot_pitch, rows) = if slot == 0 {
            (pitch, frame.height)
        } else {
            (chroma_pitch, chroma_rows)
        };
        let end = offset + slot_pitch * rows;
        for (dst, src) in buffer[offset..end]
            .chunks_mut(slot_pitch)
            .zip(frame.rows(plane))
        {
            let len = src.len().min(dst.len());
            dst[..len].copy_from_slice(&src[..len]);
        }
        offset = end;
    }
    Ok(())
}
