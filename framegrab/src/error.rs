use std::{fmt, io, path::PathBuf};

use framegrab_libav::AvError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Where the pipeline was when something went wrong.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Init,
    StreamSelected,
    Reading,
    Decoding,
    Sinking,
    Draining,
    Closed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Init => "open",
            Stage::StreamSelected => "stream selection",
            Stage::Reading => "read",
            Stage::Decoding => "decode",
            Stage::Sinking => "sink",
            Stage::Draining => "drain",
            Stage::Closed => "close",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not open {}: {source}", path.display())]
    Open { path: PathBuf, source: AvError },

    #[error("could not read stream information from {}: {source}", path.display())]
    StreamInfo { path: PathBuf, source: AvError },

    #[error("no video stream found in {}", path.display())]
    NoVideoStream { path: PathBuf },

    #[error("could not open {codec} decoder: {source}")]
    CodecOpen { codec: String, source: AvError },

    #[error("decoder reported an error: {0}")]
    Decode(AvError),

    #[error("pixel format conversion failed: {0}")]
    Convert(String),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn stage(&self) -> Stage {
        match self {
            Error::Open { .. } | Error::StreamInfo { .. } | Error::Config(_) => Stage::Init,
            Error::NoVideoStream { .. } | Error::CodecOpen { .. } => Stage::StreamSelected,
            Error::Decode(_) => Stage::Decoding,
            Error::Convert(_) | Error::Sink(_) => Stage::Sinking,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("could not write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("could not encode {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("display error: {0}")]
    Display(String),
}

impl From<sdl2::video::WindowBuildError> for SinkError {
    fn from(e: sdl2::video::WindowBuildError) -> Self {
        SinkError::Display(e.to_string())
    }
}

impl From<sdl2::IntegerOrSdlError> for SinkError {
    fn from(e: sdl2::IntegerOrSdlError) -> Self {
        SinkError::Display(e.to_string())
    }
}

impl From<sdl2::render::TextureValueError> for SinkError {
    fn from(e: sdl2::render::TextureValueError) -> Self {
        SinkError::Display(e.to_string())
    }
}
