use tracing::{debug, info, trace};

use crate::{
    decode::{DecodeAdapter, Decoder},
    error::{Result, Stage},
    frame::{PixelFormat, VideoFrame},
    sink::FrameSink,
};

/// Identifies the selected video stream. Fixed once the stream is chosen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamDescriptor {
    pub index: usize,
    pub width: usize,
    pub height: usize,
    pub pixel_format: String,
}

pub trait CodedPacket {
    fn stream_index(&self) -> usize;
}

/// Produces packets in container order.
pub trait Demuxer {
    type Packet: CodedPacket;

    /// `Ok(None)` once the input is exhausted.
    fn next_packet(&mut self) -> Result<Option<Self::Packet>>;
}

/// Converts decoder output to the layout a sink asks for, at the same size.
pub trait Converter<F> {
    fn convert(&mut self, frame: &F, format: PixelFormat) -> Result<VideoFrame>;
}

/// When a run stops before the end of input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunLimits {
    pub max_frames: Option<u64>,
}

impl RunLimits {
    pub fn frames(max_frames: u64) -> Self {
        Self {
            max_frames: Some(max_frames),
        }
    }

    fn reached(&self, delivered: u64) -> bool {
        self.max_frames.is_some_and(|max| delivered >= max)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    EndOfInput,
    FrameLimit,
    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Summary {
    pub frames: u64,
    pub outcome: Outcome,
}

/// Owns the demuxer, decoder and converter for one run. Dropping it releases
/// all of them, whichever way the run ended.
pub struct Pipeline<M, D, C> {
    stream: StreamDescriptor,
    demuxer: M,
    decoder: DecodeAdapter<D>,
    converter: C,
    delivered: u64,
}

impl<M, D, C> Pipeline<M, D, C>
where
    M: Demuxer,
    D: Decoder<Packet = M::Packet>,
    C: Converter<D::Frame>,
{
    pub fn new(stream: StreamDescriptor, demuxer: M, decoder: D, converter: C) -> Self {
        Self {
            stream,
            demuxer,
            decoder: DecodeAdapter::new(decoder),
            converter,
            delivered: 0,
        }
    }

    pub fn stream(&self) -> &StreamDescriptor {
        &self.stream
    }

    /// Reads, decodes and sinks until the input ends, `limits` is hit or the
    /// sink asks to quit. Any error aborts the run.
    pub fn run<S>(mut self, sink: &mut S, limits: RunLimits) -> Result<Summary>
    where
        S: FrameSink + ?Sized,
    {
        if limits.reached(self.delivered) {
            return Ok(self.finish(Outcome::FrameLimit));
        }
        debug!(stage = %Stage::Reading, stream = self.stream.index, "starting decode loop");
        while let Some(packet) = self.demuxer.next_packet()? {
            if packet.stream_index() == self.stream.index {
                if let Some(frame) = self.decoder.decode(Some(&packet))? {
                    self.deliver(&frame, sink)?;
                }
            } else {
                trace!(stream = packet.stream_index(), "skipping packet");
            }
            drop(packet);

            if limits.reached(self.delivered) {
                return Ok(self.finish(Outcome::FrameLimit));
            }
            if sink.quit_requested() {
                return Ok(self.finish(Outcome::Quit));
            }
        }

        debug!(stage = %Stage::Draining, "input exhausted, flushing decoder");
        while !limits.reached(self.delivered) {
            match self.decoder.decode(None)? {
                Some(frame) => self.deliver(&frame, sink)?,
                None => break,
            }
        }
        let outcome = if limits.reached(self.delivered) {
            Outcome::FrameLimit
        } else {
            Outcome::EndOfInput
        };
        Ok(self.finish(outcome))
    }

    fn deliver<S>(&mut self, frame: &D::Frame, sink: &mut S) -> Result<()>
    where
        S: FrameSink + ?Sized,
    {
        let converted = self.converter.convert(frame, sink.pixel_format())?;
        sink.consume(converted, self.delivered)?;
        self.delivered += 1;
        Ok(())
    }

    fn finish(&self, outcome: Outcome) -> Summary {
        info!(frames = self.delivered, ?outcome, "decode loop finished");
        Summary {
            frames: self.delivered,
            outcome,
        }
    }
}

impl<M, D, C> Drop for Pipeline<M, D, C> {
    fn drop(&mut self) {
        debug!(stage = %Stage::Closed, "releasing decoder and input");
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, collections::VecDeque, fs, rc::Rc};

    use framegrab_libav::AvError;

    use super::*;
    use crate::{
        error::{Error, SinkError},
        frame::Plane,
        sink::FileSink,
    };

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    struct Pkt {
        stream: usize,
        id: u32,
    }

    impl CodedPacket for Pkt {
        fn stream_index(&self) -> usize {
            self.stream
        }
    }

    struct FakeDemuxer(VecDeque<Pkt>);

    impl Demuxer for FakeDemuxer {
        type Packet = Pkt;

        fn next_packet(&mut self) -> Result<Option<Pkt>> {
            Ok(self.0.pop_front())
        }
    }

    fn packets(streams: &[usize]) -> FakeDemuxer {
        FakeDemuxer(
            streams
                .iter()
                .enumerate()
                .map(|(id, &stream)| Pkt {
                    stream,
                    id: id as u32,
                })
                .collect(),
        )
    }

    /// Emits each packet's id as a frame after `delay` further packets, so
    /// the last `delay` frames only come out when flushed.
    struct DelayDecoder {
        delay: usize,
        queue: VecDeque<u32>,
        flushing: bool,
        seen: Rc<std::cell::RefCell<Vec<Pkt>>>,
        fail_on: Option<u32>,
        released: Rc<Cell<bool>>,
    }

    impl DelayDecoder {
        fn new(delay: usize) -> Self {
            Self {
                delay,
                queue: VecDeque::new(),
                flushing: false,
                seen: Default::default(),
                fail_on: None,
                released: Default::default(),
            }
        }
    }

    impl Drop for DelayDecoder {
        fn drop(&mut self) {
            self.released.set(true);
        }
    }

    impl Decoder for DelayDecoder {
        type Packet = Pkt;
        type Frame = u32;

        fn send(&mut self, packet: Option<&Pkt>) -> Result<(), AvError> {
            match packet {
                Some(p) if Some(p.id) == self.fail_on => Err(AvError::INVALID),
                Some(p) => {
                    self.seen.borrow_mut().push(*p);
                    self.queue.push_back(p.id);
                    Ok(())
                }
                None if self.flushing => Err(AvError::EOF),
                None => {
                    self.flushing = true;
                    Ok(())
                }
            }
        }

        fn receive(&mut self) -> Result<u32, AvError> {
            if self.queue.len() > self.delay || (self.flushing && !self.queue.is_empty()) {
                Ok(self.queue.pop_front().unwrap())
            } else if self.flushing {
                Err(AvError::EOF)
            } else {
                Err(AvError::AGAIN)
            }
        }
    }

    /// Turns a frame id into a 1x1 RGB frame carrying the id in red.
    struct IdConverter;

    impl Converter<u32> for IdConverter {
        fn convert(&mut self, frame: &u32, format: PixelFormat) -> Result<VideoFrame> {
            assert_eq!(format, PixelFormat::Rgb24);
            Ok(VideoFrame::new(
                1,
                1,
                format,
                vec![Plane::new(vec![*frame as u8, 0, 0], 3)],
            ))
        }
    }

    #[derive(Default)]
    struct Recorder {
        frames: Vec<(u64, u8)>,
        quit_after: Option<usize>,
        polls: usize,
    }

    impl FrameSink for Recorder {
        fn pixel_format(&self) -> PixelFormat {
            PixelFormat::Rgb24
        }

        fn consume(&mut self, frame: VideoFrame, sequence: u64) -> Result<(), SinkError> {
            self.frames.push((sequence, frame.planes[0].data[0]));
            Ok(())
        }

        fn quit_requested(&mut self) -> bool {
            self.polls += 1;
            self.quit_after.is_some_and(|n| self.polls >= n)
        }
    }

    fn stream() -> StreamDescriptor {
        StreamDescriptor {
            index: 0,
            width: 1,
            height: 1,
            pixel_format: String::from("yuv420p"),
        }
    }

    #[test]
    fn foreign_packets_never_reach_the_decoder() {
        let decoder = DelayDecoder::new(0);
        let seen = Rc::clone(&decoder.seen);
        let pipeline = Pipeline::new(stream(), packets(&[1, 0, 2, 0, 1]), decoder, IdConverter);
        let mut sink = Recorder::default();
        let summary = pipeline.run(&mut sink, RunLimits::default()).unwrap();

        assert!(seen.borrow().iter().all(|p| p.stream == 0));
        assert_eq!(seen.borrow().len(), 2);
        assert_eq!(sink.frames, vec![(0, 1), (1, 3)]);
        assert_eq!(summary.outcome, Outcome::EndOfInput);
    }

    #[test]
    fn draining_delivers_buffered_trailing_frames() {
        let pipeline = Pipeline::new(stream(), packets(&[0, 0, 0]), DelayDecoder::new(1), IdConverter);
        let mut sink = Recorder::default();
        let summary = pipeline.run(&mut sink, RunLimits::default()).unwrap();

        assert_eq!(sink.frames, vec![(0, 0), (1, 1), (2, 2)]);
        assert_eq!(summary, Summary { frames: 3, outcome: Outcome::EndOfInput });
    }

    #[test]
    fn frame_limit_stops_early() {
        let pipeline = Pipeline::new(stream(), packets(&[0; 25]), DelayDecoder::new(2), IdConverter);
        let mut sink = Recorder::default();
        let summary = pipeline.run(&mut sink, RunLimits::frames(10)).unwrap();

        assert_eq!(sink.frames.len(), 10);
        assert_eq!(summary.outcome, Outcome::FrameLimit);
    }

    #[test]
    fn frame_limit_applies_while_draining() {
        let pipeline = Pipeline::new(stream(), packets(&[0; 5]), DelayDecoder::new(4), IdConverter);
        let mut sink = Recorder::default();
        let summary = pipeline.run(&mut sink, RunLimits::frames(3)).unwrap();

        assert_eq!(sink.frames, vec![(0, 0), (1, 1), (2, 2)]);
        assert_eq!(summary.outcome, Outcome::FrameLimit);
    }

    #[test]
    fn quit_skips_draining() {
        let pipeline = Pipeline::new(stream(), packets(&[0; 6]), DelayDecoder::new(1), IdConverter);
        let mut sink = Recorder {
            quit_after: Some(3),
            ..Default::default()
        };
        let summary = pipeline.run(&mut sink, RunLimits::default()).unwrap();

        assert_eq!(summary.outcome, Outcome::Quit);
        assert_eq!(sink.polls, 3);
        assert_eq!(sink.frames, vec![(0, 0), (1, 1)]);
    }

    #[test]
    fn decode_error_aborts_and_releases_the_decoder() {
        let mut decoder = DelayDecoder::new(0);
        decoder.fail_on = Some(2);
        let released = Rc::clone(&decoder.released);
        let pipeline = Pipeline::new(stream(), packets(&[0; 5]), decoder, IdConverter);
        let mut sink = Recorder::default();

        match pipeline.run(&mut sink, RunLimits::default()) {
            Err(Error::Decode(e)) => assert_eq!(e, AvError::INVALID),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(sink.frames.len(), 2);
        assert!(released.get());
    }

    #[test]
    fn file_mode_writes_at_most_ten_frames() {
        for total in [3usize, 10, 25] {
            let dir = tempfile::tempdir().unwrap();
            let mut sink = FileSink::new(dir.path());
            let pipeline = Pipeline::new(
                stream(),
                packets(&vec![0; total]),
                DelayDecoder::new(1),
                IdConverter,
            );
            pipeline.run(&mut sink, RunLimits::frames(10)).unwrap();

            let mut names: Vec<String> = fs::read_dir(dir.path())
                .unwrap()
                .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
                .collect();
            names.sort();
            let mut expected: Vec<String> =
                (0..total.min(10)).map(|n| format!("frame{n}.ppm")).collect();
            expected.sort();
            assert_eq!(names, expected);
            for name in &names {
                let bytes = fs::read(dir.path().join(name)).unwrap();
                assert_eq!(bytes.len(), b"P6\n1 1\n255\n".len() + 3);
                assert!(bytes.starts_with(b"P6\n1 1\n255\n"));
            }
        }
    }
}
