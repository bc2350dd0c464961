use framegrab_libav::AvError;

use crate::error::{Error, Result};

/// The submit/retrieve pair exposed by a codec.
pub trait Decoder {
    type Packet;
    type Frame;

    /// Queues `packet`, or requests a flush when it is `None`.
    fn send(&mut self, packet: Option<&Self::Packet>) -> Result<(), AvError>;

    fn receive(&mut self) -> Result<Self::Frame, AvError>;
}

/// Folds the decoder's asynchronous interface into one synchronous call that
/// yields at most one frame.
pub struct DecodeAdapter<D> {
    decoder: D,
    flushing: bool,
}

impl<D: Decoder> DecodeAdapter<D> {
    pub fn new(decoder: D) -> Self {
        Self {
            decoder,
            flushing: false,
        }
    }

    /// Feeds one packet (or the end-of-stream marker) and polls for a frame.
    ///
    /// "Needs more input" and "end of stream" are reported as `Ok(None)`;
    /// every other decoder status is fatal. Once the end marker has been
    /// submitted, later `None` calls only poll, so buffered frames can be
    /// drained one at a time.
    pub fn decode(&mut self, packet: Option<&D::Packet>) -> Result<Option<D::Frame>> {
        if packet.is_some() || !self.flushing {
            match self.decoder.send(packet) {
                Ok(()) => {}
                Err(e) if e.is_eof() => return Ok(None),
                Err(e) => return Err(Error::Decode(e)),
            }
            if packet.is_none() {
                self.flushing = true;
            }
        }

        match self.decoder.receive() {
            Ok(frame) => Ok(Some(frame)),
            Err(e) if e.is_again() || e.is_eof() => Ok(None),
            Err(e) => Err(Error::Decode(e)),
        }
    }
}
