use bytes::{Buf, BytesMut};
use serde_json::Value;

/// One decoded line of a stream response.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Data(Value),
    Ping,
}

/// Reassembles newline terminated frames from arbitrarily split chunks.
///
/// Splitting happens on raw bytes so a multi-byte character cut in half by the network is rejoined before it is decoded.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Take the next complete frame out of the buffer, if there is one.
    ///
    /// The line is removed from the buffer even when it fails to decode.
    pub fn next_frame(&mut self) -> Option<Result<Frame, serde_json::Error>> {
        let end = self.buf.iter().position(|b| *b == b'\n')?;
        let line = self.buf.split_to(end);
        self.buf.advance(1);

        if line.is_empty() {
            return Some(Ok(Frame::Ping));
        }
        Some(serde_json::from_slice(&line).map(Frame::Data))
    }

    /// Bytes received after the last newline.
    pub fn remaining(&self) -> &[u8] {
        &self.buf
    }
}
