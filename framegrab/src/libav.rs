//! Binds the libav wrappers to the pipeline's demux, decode and convert seams.

use framegrab_libav::{
    self as av, pixel_format_name, AVPixelFormat, AvError, Dictionary, Format, FormatContext,
    Frame, Packet, ScaleFlags, ScalingContext,
};
use tracing::{debug, info, warn};

use crate::{
    config::VideoSource,
    decode::Decoder,
    error::{Error, Result, Stage},
    frame::{PixelFormat, Plane, VideoFrame},
    pipeline::{CodedPacket, Converter, Demuxer, Pipeline, StreamDescriptor},
};

pub type LibavPipeline = Pipeline<LibavInput, av::Decoder, LibavConverter>;

/// Opens `source`, selects its best video stream and opens a decoder for it.
pub fn open(source: &VideoSource, dump: bool) -> Result<LibavPipeline> {
    let path = &source.path;
    let url = path
        .to_str()
        .ok_or_else(|| Error::Config(format!("{} is not valid UTF-8", path.display())))?;

    let format = match source.format.as_deref() {
        Some(name) => Some(
            Format::from_name(name)
                .ok_or_else(|| Error::Config(format!("unknown input format {name}")))?,
        ),
        None => None,
    };
    let mut options = Dictionary::from_pairs(&source.options)
        .map_err(|e| Error::Config(format!("invalid input option: {e}")))?;

    let mut context =
        FormatContext::open(url, format, Some(&mut options)).map_err(|source| Error::Open {
            path: path.clone(),
            source,
        })?;
    for key in options.keys() {
        warn!("input option {key} was not used");
    }
    context
        .find_stream_info()
        .map_err(|source| Error::StreamInfo {
            path: path.clone(),
            source,
        })?;
    info!(stage = %Stage::Init, "opened {url}");
    if dump {
        context.dump(url);
    }

    let (stream, decoder) = {
        let stream = context
            .best_video_stream()
            .map_err(|_| Error::NoVideoStream { path: path.clone() })?;
        let decoder = stream
            .create_decoder(source.video_codec.as_deref())
            .map_err(|e| Error::CodecOpen {
                codec: source
                    .video_codec
                    .clone()
                    .unwrap_or_else(|| stream.codec_name()),
                source: e,
            })?;
        let descriptor = StreamDescriptor {
            index: stream.index(),
            width: stream.width(),
            height: stream.height(),
            pixel_format: pixel_format_name(stream.pixel_format()),
        };
        (descriptor, decoder)
    };
    info!(
        stage = %Stage::StreamSelected,
        stream = stream.index,
        codec = decoder.codec_name(),
        "{}x{} {}",
        stream.width,
        stream.height,
        stream.pixel_format,
    );

    Ok(Pipeline::new(
        stream,
        LibavInput { context },
        decoder,
        LibavConverter::new(ScaleFlags::BILINEAR),
    ))
}

pub struct LibavInput {
    context: FormatContext,
}

impl Demuxer for LibavInput {
    type Packet = Packet;

    fn next_packet(&mut self) -> Result<Option<Packet>> {
        match self.context.read_packet() {
            Ok(packet) => Ok(packet),
            Err(e) => {
                warn!("read failed, treating as end of input: {e}");
                Ok(None)
            }
        }
    }
}

impl CodedPacket for Packet {
    fn stream_index(&self) -> usize {
        Packet::stream_index(self)
    }
}

impl Decoder for av::Decoder {
    type Packet = Packet;
    type Frame = Frame;

    fn send(&mut self, packet: Option<&Packet>) -> Result<(), AvError> {
        av::Decoder::send(self, packet)
    }

    fn receive(&mut self) -> Result<Frame, AvError> {
        let mut frame = Frame::new().ok_or(AvError::NO_MEMORY)?;
        av::Decoder::receive(self, &mut frame)?;
        Ok(frame)
    }
}

fn av_pixel_format(format: PixelFormat) -> AVPixelFormat {
    match format {
        PixelFormat::Rgb24 => AVPixelFormat::AV_PIX_FMT_RGB24,
        PixelFormat::Yuv420p => AVPixelFormat::AV_PIX_FMT_YUV420P,
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
struct ScalerKey {
    width: usize,
    height: usize,
    src: AVPixelFormat,
    dst: AVPixelFormat,
}

struct Scaler {
    key: ScalerKey,
    context: ScalingContext,
}

/// Same-size conversion through libswscale. The scaling context is built on
/// first use and rebuilt whenever the input size or layout changes.
pub struct LibavConverter {
    flags: ScaleFlags,
    scaler: Option<Scaler>,
}

impl LibavConverter {
    pub fn new(flags: ScaleFlags) -> Self {
        Self {
            flags,
            scaler: None,
        }
    }

    fn scaler(&mut self, key: ScalerKey) -> Result<&mut ScalingContext> {
        let scaler = match self.scaler.take() {
            Some(scaler) if scaler.key == key => scaler,
            _ => {
                debug!(
                    "creating {}x{} scaler {} -> {}",
                    key.width,
                    key.height,
                    pixel_format_name(key.src),
                    pixel_format_name(key.dst)
                );
                let context = ScalingContext::new(
                    key.width, key.height, key.src, key.width, key.height, key.dst, self.flags,
                )
                .ok_or_else(|| {
                    Error::Convert(format!(
                        "no conversion from {} to {}",
                        pixel_format_name(key.src),
                        pixel_format_name(key.dst)
                    ))
                })?;
                Scaler { key, context }
            }
        };
        Ok(&mut self.scaler.insert(scaler).context)
    }
}

impl Converter<Frame> for LibavConverter {
    fn convert(&mut self, frame: &Frame, format: PixelFormat) -> Result<VideoFrame> {
        let (width, height) = (frame.width(), frame.height());
        if width == 0 || height == 0 {
            return Err(Error::Convert(format!(
                "decoded frame has no picture ({width}x{height})"
            )));
        }
        let dst = av_pixel_format(format);
        let mut converted = Frame::alloc(width, height, dst)
            .ok_or_else(|| Error::Convert(format!("could not allocate {width}x{height} frame")))?;
        self.scaler(ScalerKey {
            width,
            height,
            src: frame.format(),
            dst,
        })?
        .scale(frame, &mut converted)
        .map_err(|e| Error::Convert(e.to_string()))?;

        let planes = (0..format.plane_count())
            .map(|index| {
                converted
                    .plane(index)
                    .map(|plane| Plane::new(plane.data.to_vec(), plane.stride))
                    .ok_or_else(|| Error::Convert(format!("converted frame lacks plane {index}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(VideoFrame::new(width, height, format, planes))
    }
}
