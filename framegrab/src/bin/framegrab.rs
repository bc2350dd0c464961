use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use framegrab::{Config, ImageFormat, Mode, Outcome, Summary};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Decode the video stream of a media file and dump or display its frames.
#[derive(Parser, Debug)]
#[command(name = "framegrab", version)]
struct Cli {
    /// Media file, url or capture device to read.
    input: PathBuf,

    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Stop after this many frames. File mode defaults to 10.
    #[arg(long, value_name = "N")]
    frames: Option<u64>,

    /// Directory image files are written to.
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// File name prefix, followed by the frame number.
    #[arg(long)]
    prefix: Option<String>,

    #[arg(long, value_enum)]
    image_format: Option<ImageFormat>,

    /// Force a demuxer or input device, e.g. `v4l2`.
    #[arg(long, value_name = "FMT")]
    input_format: Option<String>,

    /// Demuxer option; may be repeated.
    #[arg(long = "option", value_name = "KEY=VALUE", value_parser = parse_option)]
    options: Vec<(String, String)>,

    /// Decoder to use instead of the codec's default.
    #[arg(long, value_name = "NAME")]
    decoder: Option<String>,

    /// Print the container and stream layout before decoding.
    #[arg(long)]
    dump: bool,

    /// TOML file with defaults; flags given here take precedence.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn parse_option(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_owned(), value.to_owned())),
        _ => Err(format!("expected KEY=VALUE, got `{arg}`")),
    }
}

impl Cli {
    fn into_config(self) -> framegrab::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        config.video_source.path = self.input;
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if self.frames.is_some() {
            config.frame_limit = self.frames;
        }
        if self.output_dir.is_some() {
            config.image.directory = self.output_dir;
        }
        if self.prefix.is_some() {
            config.image.prefix = self.prefix;
        }
        if self.image_format.is_some() {
            config.image.format = self.image_format;
        }
        if self.input_format.is_some() {
            config.video_source.format = self.input_format;
        }
        config.video_source.options.extend(self.options);
        if self.decoder.is_some() {
            config.video_source.video_codec = self.decoder;
        }
        config.dump_format |= self.dump;
        Ok(config)
    }
}

fn run(cli: Cli) -> framegrab::Result<Summary> {
    let config = cli.into_config()?;
    framegrab::run(&config)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(Summary { frames, outcome }) => {
            let reason = match outcome {
                Outcome::EndOfInput => "end of input",
                Outcome::FrameLimit => "frame limit",
                Outcome::Quit => "quit",
            };
            info!("done after {frames} frames ({reason})");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(stage = %e.stage(), "{e}");
            ExitCode::from(255)
        }
    }
}
