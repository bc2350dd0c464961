use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    pipeline::RunLimits,
    sink::ImageFormat,
};

/// Frames written in file mode when no limit is configured.
pub const DEFAULT_FRAME_LIMIT: u64 = 10;

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct VideoSource {
    /// Any file or url libavformat can open. For capture devices such as
    /// `/dev/video0` also set `format` (e.g. `v4l2`).
    #[serde(default)]
    pub path: PathBuf,
    pub format: Option<String>,
    /// Demuxer options, as they would be passed on the ffmpeg command line.
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    /// Decoder to use instead of the default for the stream's codec.
    pub video_codec: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct ImageSettings {
    pub prefix: Option<String>,
    pub format: Option<ImageFormat>,
    pub directory: Option<PathBuf>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct DisplaySettings {
    pub title: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Write the first frames to image files.
    #[default]
    File,
    /// Show every frame in a window.
    Display,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub video_source: VideoSource,
    #[serde(default)]
    pub mode: Mode,
    pub frame_limit: Option<u64>,
    #[serde(default)]
    pub dump_format: bool,
    #[serde(default)]
    pub image: ImageSettings,
    #[serde(default)]
    pub display: DisplaySettings,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let buf = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        toml::from_str(&buf).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    pub fn limits(&self) -> RunLimits {
        match self.mode {
            Mode::File => RunLimits::frames(self.frame_limit.unwrap_or(DEFAULT_FRAME_LIMIT)),
            Mode::Display => RunLimits {
                max_frames: self.frame_limit,
            },
        }
    }

    pub fn title(&self) -> String {
        self.display.title.clone().unwrap_or_else(|| {
            format!("framegrab - {}", self.video_source.path.display())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let config: Config = toml::from_str(
            r#"
            mode = "display"
            frame_limit = 100
            dump_format = true

            [video_source]
            path = "/dev/video0"
            format = "v4l2"
            video_codec = "h264_v4l2m2m"

            [video_source.options]
            video_size = "640x480"

            [image]
            prefix = "shot"
            format = "png"

            [display]
            title = "preview"
            "#,
        )
        .unwrap();

        assert_eq!(config.mode, Mode::Display);
        assert_eq!(config.video_source.format.as_deref(), Some("v4l2"));
        assert_eq!(config.video_source.options["video_size"], "640x480");
        assert_eq!(config.image.format, Some(ImageFormat::Png));
        assert_eq!(config.limits(), RunLimits::frames(100));
        assert_eq!(config.title(), "preview");
    }

    #[test]
    fn file_mode_defaults_to_ten_frames() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.mode, Mode::File);
        assert_eq!(config.limits(), RunLimits::frames(10));

        let display = Config {
            mode: Mode::Display,
            ..Config::default()
        };
        assert_eq!(display.limits(), RunLimits::default());
    }

    #[test]
    fn round_trips_through_toml() {
        let mut config = Config::default();
        config.video_source.path = PathBuf::from("Wildlife.wmv");
        config.image.format = Some(ImageFormat::Jpeg);
        let serialized = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        assert!(matches!(
            Config::from_file("/nonexistent/framegrab.toml"),
            Err(Error::Config(_))
        ));
    }
}
