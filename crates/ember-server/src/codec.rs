//! Newline framing that survives bad input.
//!
//! Lines are split on raw bytes so invalid UTF-8 and over-long lines surface
//! as items instead of decode errors, which would end the framed stream.

use std::io;

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, Decoder, Encoder};

/// One inbound unit as seen by the connection loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundLine {
    Text(String),
    InvalidUtf8,
    TooLong,
}

#[derive(Debug, thiserror::Error)]
#[error("frame io: {0}")]
pub struct FrameIoError(#[from] io::Error);

pub struct FrameCodec {
    inner: AnyDelimiterCodec,
}

impl FrameCodec {
    pub fn new(max_len: usize) -> Self {
        Self {
            inner: AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), b"\n".to_vec(), max_len),
        }
    }
}

fn classify(
    decoded: Result<Option<Bytes>, AnyDelimiterCodecError>,
) -> Result<Option<InboundLine>, FrameIoError> {
    match decoded {
        Ok(Some(chunk)) => Ok(Some(match String::from_utf8(chunk.to_vec()) {
            Ok(mut text) => {
                if text.ends_with('\r') {
                    let _ = text.pop();
                }
                InboundLine::Text(text)
            }
            Err(_) => InboundLine::InvalidUtf8,
        })),
        Ok(None) => Ok(None),
        Err(AnyDelimiterCodecError::MaxChunkLengthExceeded) => Ok(Some(InboundLine::TooLong)),
        Err(AnyDelimiterCodecError::Io(e)) => Err(FrameIoError(e)),
    }
}

impl Decoder for FrameCodec {
    type Item = InboundLine;
    type Error = FrameIoError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<InboundLine>, FrameIoError> {
        classify(self.inner.decode(src))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<InboundLine>, FrameIoError> {
        classify(self.inner.decode_eof(src))
    }
}

impl Encoder<String> for FrameCodec {
    type Error = FrameIoError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), FrameIoError> {
        self.inner.encode(line, dst).map_err(|e| match e {
            AnyDelimiterCodecError::Io(e) => FrameIoError(e),
            AnyDelimiterCodecError::MaxChunkLengthExceeded => {
                FrameIoError(io::Error::new(io::ErrorKind::InvalidInput, "frame too long"))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(codec: &mut FrameCodec, input: &[u8]) -> Vec<InboundLine> {
        let mut buf = BytesMut::from(input);
        let mut out = Vec::new();
        while let Some(item) = codec.decode(&mut buf).unwrap() {
            out.push(item);
        }
        out
    }

    #[test]
    fn splits_lines_and_strips_carriage_return() {
        let mut codec = FrameCodec::new(1024);
        let items = decode_all(&mut codec, b"{\"type\":\"ping\"}\r\nsecond\npartial");
        assert_eq!(
            items,
            vec![
                InboundLine::Text("{\"type\":\"ping\"}".into()),
                InboundLine::Text("second".into()),
            ]
        );
    }

    #[test]
    fn invalid_utf8_is_an_item_not_an_error() {
        let mut codec = FrameCodec::new(1024);
        let items = decode_all(&mut codec, b"{\"content\":\"\xff\xfe\"}\nnext\n");
        assert_eq!(
            items,
            vec![InboundLine::InvalidUtf8, InboundLine::Text("next".into())]
        );
    }

    #[test]
    fn over_long_line_is_reported_then_skipped() {
        let mut codec = FrameCodec::new(8);
        let mut input = vec![b'x'; 32];
        input.extend_from_slice(b"\nok\n");
        let items = decode_all(&mut codec, &input);
        assert_eq!(
            items,
            vec![InboundLine::TooLong, InboundLine::Text("ok".into())]
        );
    }

    #[test]
    fn encodes_newline_terminated() {
        let mut codec = FrameCodec::new(1024);
        let mut buf = BytesMut::new();
        codec.encode("{\"type\":\"pong\"}".to_string(), &mut buf).unwrap();
        assert_eq!(&buf[..], b"{\"type\":\"pong\"}\n");
    }
}
