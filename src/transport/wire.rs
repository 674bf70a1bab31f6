// Length-prefixed request/response frames spoken by the bundled TCP transport.
use std::io::{self, Read, Write};

use bytes::Bytes;

use crate::core::codec::{DecodeError, EncodeError, Packer, Unpacker};
use crate::core::status::TransportStatus;

pub const FRAME_PREFIX_LEN: usize = 4;
pub const MAX_FRAME_BODY: usize = 64 * 1024 * 1024;

const KIND_REQUEST: u8 = 0x01;
const KIND_RESPONSE: u8 = 0x02;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RequestFrame {
    pub id: u64,
    pub service: String,
    pub function: String,
    pub input: Vec<u8>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResponseFrame {
    pub id: u64,
    pub status: TransportStatus,
    pub output: Bytes,
}

pub fn encode_request(
    id: u64,
    service: &str,
    function: &str,
    input: &[u8],
) -> Result<Vec<u8>, EncodeError> {
    let mut body = Packer::new();
    body.u8(KIND_REQUEST).u64(id).str(service).str(function).bytes(input);
    with_prefix(body.finish()?)
}

pub fn encode_response(
    id: u64,
    status: TransportStatus,
    output: &[u8],
) -> Result<Vec<u8>, EncodeError> {
    let mut body = Packer::new();
    body.u8(KIND_RESPONSE).u64(id).u8(status.code()).bytes(output);
    with_prefix(body.finish()?)
}

fn with_prefix(body: Vec<u8>) -> Result<Vec<u8>, EncodeError> {
    if body.len() > MAX_FRAME_BODY {
        return Err(EncodeError::TooLong {
            len: body.len(),
            max: MAX_FRAME_BODY,
        });
    }
    let mut prefix = Packer::new();
    prefix.count(body.len());
    let mut out = prefix.finish()?;
    out.reserve(body.len());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Total length (prefix included) of the frame at the front of `buf`, once the
/// prefix is available.
pub fn frame_len(buf: &[u8]) -> Result<Option<usize>, DecodeError> {
    if buf.len() < FRAME_PREFIX_LEN {
        return Ok(None);
    }
    let mut prefix = [0u8; FRAME_PREFIX_LEN];
    prefix.copy_from_slice(&buf[..FRAME_PREFIX_LEN]);
    let body_len = u32::from_le_bytes(prefix) as usize;
    if body_len > MAX_FRAME_BODY {
        return Err(DecodeError::Invalid("frame length"));
    }
    Ok(Some(FRAME_PREFIX_LEN + body_len))
}

pub fn decode_request(body: &[u8]) -> Result<RequestFrame, DecodeError> {
    let mut up = Unpacker::new(body);
    if up.u8()? != KIND_REQUEST {
        return Err(DecodeError::Invalid("request kind"));
    }
    let id = up.u64()?;
    let service = up.str()?.to_string();
    let function = up.str()?.to_string();
    let input = up.bytes()?.to_vec();
    up.finish()?;
    Ok(RequestFrame {
        id,
        service,
        function,
        input,
    })
}

/// Decode a response body; the output shares `body`'s allocation.
pub fn decode_response(body: Bytes) -> Result<ResponseFrame, DecodeError> {
    let mut up = Unpacker::new(&body);
    if up.u8()? != KIND_RESPONSE {
        return Err(DecodeError::Invalid("response kind"));
    }
    let id = up.u64()?;
    let status =
        TransportStatus::from_code(up.u8()?).ok_or(DecodeError::Invalid("status code"))?;
    let output_len = up.u32()? as usize;
    let start = up.position();
    if up.remaining() != output_len {
        return Err(if up.remaining() < output_len {
            DecodeError::Short {
                needed: output_len,
                remaining: up.remaining(),
            }
        } else {
            DecodeError::Trailing {
                remaining: up.remaining() - output_len,
            }
        });
    }
    let output = body.slice(start..start + output_len);
    Ok(ResponseFrame { id, status, output })
}

/// Blocking read of one frame body; `Ok(None)` on a clean end of stream.
pub fn read_frame(reader: &mut impl Read) -> io::Result<Option<Vec<u8>>> {
    let mut prefix = [0u8; FRAME_PREFIX_LEN];
    match reader.read_exact(&mut prefix) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err),
    }
    let total = frame_len(&prefix)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?
        .unwrap_or(FRAME_PREFIX_LEN);
    let mut body = vec![0u8; total - FRAME_PREFIX_LEN];
    reader.read_exact(&mut body)?;
    Ok(Some(body))
}

pub fn write_frame(writer: &mut impl Write, frame: &[u8]) -> io::Result<()> {
    writer.write_all(frame)?;
    writer.flush()
}
