use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::PathBuf,
};

use image::{
    error::{LimitError, LimitErrorKind, ParameterError, ParameterErrorKind},
    ImageError,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::FrameSink;
use crate::{error::SinkError, frame::PixelFormat, VideoFrame};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Binary PPM (P6), written directly.
    #[default]
    Ppm,
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Ppm => "ppm",
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
        }
    }
}

/// Writes each frame to `<directory>/<prefix><sequence>.<ext>`.
#[derive(Debug)]
pub struct FileSink {
    directory: PathBuf,
    prefix: String,
    format: ImageFormat,
}

impl FileSink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            prefix: String::from("frame"),
            format: ImageFormat::default(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = format;
        self
    }

    pub fn path_for(&self, sequence: u64) -> PathBuf {
        self.directory.join(format!(
            "{}{sequence}.{}",
            self.prefix,
            self.format.extension()
        ))
    }

    fn write_ppm_file(&self, frame: &VideoFrame, path: PathBuf) -> Result<PathBuf, SinkError> {
        let written = File::create(&path).and_then(|file| {
            let mut writer = BufWriter::new(file);
            write_ppm(&mut writer, frame)?;
            writer.flush()
        });
        match written {
            Ok(()) => Ok(path),
            Err(source) => Err(SinkError::Write { path, source }),
        }
    }

    fn encode_file(&self, frame: &VideoFrame, path: PathBuf) -> Result<PathBuf, SinkError> {
        let format = match self.format {
            ImageFormat::Png => image::ImageFormat::Png,
            _ => image::ImageFormat::Jpeg,
        };
        let encoded = match (u32::try_from(frame.width), u32::try_from(frame.height)) {
            (Ok(width), Ok(height)) => image::RgbImage::from_vec(width, height, frame.packed(0))
                .ok_or_else(|| {
                    ImageError::Parameter(ParameterError::from_kind(
                        ParameterErrorKind::DimensionMismatch,
                    ))
                })
                .and_then(|image| image.save_with_format(&path, format)),
            _ => Err(ImageError::Limits(LimitError::from_kind(
                LimitErrorKind::DimensionError,
            ))),
        };
        match encoded {
            Ok(()) => Ok(path),
            Err(source) => Err(SinkError::Encode { path, source }),
        }
    }
}

impl FrameSink for FileSink {
    fn pixel_format(&self) -> PixelFormat {
        PixelFormat::Rgb24
    }

    fn consume(&mut self, frame: VideoFrame, sequence: u64) -> Result<(), SinkError> {
        let path = self.path_for(sequence);
        let path = match self.format {
            ImageFormat::Ppm => self.write_ppm_file(&frame, path)?,
            ImageFormat::Png | ImageFormat::Jpeg => self.encode_file(&frame, path)?,
        };
        info!("wrote frame {sequence} to {}", path.display());
        Ok(())
    }
}

/// Writes `frame` (packed RGB) as a binary PPM: the `P6` header, then
/// `height` rows of `width * 3` bytes with the stride padding dropped.
pub fn write_ppm<W: Write>(writer: &mut W, frame: &VideoFrame) -> io::Result<()> {
    write!(writer, "P6\n{} {}\n255\n", frame.width, frame.height)?;
    for row in frame.rows(0) {
        writer.write_all(row)?;
    }
    Ok(())
}
