mod config;
mod decode;
mod error;
mod frame;
mod libav;
mod pipeline;
pub mod sink;

pub use config::{Config, DisplaySettings, ImageSettings, Mode, VideoSource, DEFAULT_FRAME_LIMIT};
pub use decode::{DecodeAdapter, Decoder};
pub use error::{Error, Result, SinkError, Stage};
pub use frame::{PixelFormat, Plane, VideoFrame};
pub use libav::{open, LibavConverter, LibavInput, LibavPipeline};
pub use pipeline::{
    CodedPacket, Converter, Demuxer, Outcome, Pipeline, RunLimits, StreamDescriptor, Summary,
};
pub use sink::ImageFormat;

use sink::{Display, FileSink};

/// Runs one capture session end to end with the sink `config.mode` selects.
pub fn run(config: &Config) -> Result<Summary> {
    let pipeline = open(&config.video_source, config.dump_format)?;
    let limits = config.limits();
    match config.mode {
        Mode::File => {
            let mut sink = FileSink::new(config.image.directory.clone().unwrap_or_default())
                .with_format(config.image.format.unwrap_or_default());
            if let Some(prefix) = &config.image.prefix {
                sink = sink.with_prefix(prefix.as_str());
            }
            pipeline.run(&mut sink, limits)
        }
        Mode::Display => {
            let stream = pipeline.stream();
            let mut display = Display::open(&config.title(), stream.width, stream.height)?;
            let mut sink = display.sink()?;
            pipeline.run(&mut sink, limits)
        }
    }
}
