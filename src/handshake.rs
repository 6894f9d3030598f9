//! Connect handshake and liveness probe packets.
//!
//! These are the only packets the transport core speaks on its own; every
//! other message type is defined by the facade layer on top. The connect
//! request carries the database URL and the application name as
//! length-prefixed UTF-8 strings; the reply is a status byte optionally
//! followed by a server-side error detail.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{BeelineError, Result};
use crate::protocol::msg_type;
use crate::request::{Reply, ReplyDecoder, RequestEncoder};

/// Status byte in the connect reply meaning the server accepted us.
const STATUS_OK: u8 = 0x01;

/// Append a string as a 4-byte big-endian length followed by UTF-8 bytes.
fn put_string(buf: &mut BytesMut, value: &str) {
    buf.put_u32(value.len() as u32);
    buf.put_slice(value.as_bytes());
}

/// Read one length-prefixed UTF-8 string, advancing `buf` past it.
fn get_string(buf: &mut Bytes) -> Result<String> {
    if buf.remaining() < 4 {
        return Err(BeelineError::Decode(
            "truncated string length prefix".into(),
        ));
    }
    let len = buf.get_u32() as usize;
    if buf.remaining() < len {
        return Err(BeelineError::Decode(format!(
            "string of {} bytes but only {} remain",
            len,
            buf.remaining()
        )));
    }
    let raw = buf.split_to(len);
    String::from_utf8(raw.to_vec())
        .map_err(|err| BeelineError::Decode(format!("invalid utf-8 in string: {err}")))
}

/// Opening handshake sent immediately after the socket is established.
pub(crate) struct ConnectRequest {
    pub(crate) url: String,
    pub(crate) application: String,
}

impl RequestEncoder for ConnectRequest {
    fn msg_type(&self) -> u8 {
        msg_type::CONNECT
    }

    fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        put_string(buf, &self.url);
        put_string(buf, &self.application);
        Ok(())
    }
}

/// Server's answer to [`ConnectRequest`].
#[derive(Debug, Clone)]
pub(crate) struct ConnectReply {
    pub(crate) ok: bool,
    /// Server-provided failure reason; only meaningful when `ok` is false.
    pub(crate) error_detail: Option<String>,
}

pub(crate) struct ConnectReplyDecoder;

impl ReplyDecoder for ConnectReplyDecoder {
    type Item = ConnectReply;

    fn decode(&mut self, payload: Bytes) -> Result<Reply<ConnectReply>> {
        let mut payload = payload;
        if !payload.has_remaining() {
            return Err(BeelineError::Decode("empty connect reply".into()));
        }
        let ok = payload.get_u8() == STATUS_OK;
        let error_detail = if payload.has_remaining() {
            Some(get_string(&mut payload)?)
        } else {
            None
        };
        Ok(Reply::Last(ConnectReply { ok, error_detail }))
    }
}

/// Fire-and-forget liveness probe. No reply is expected or enqueued.
pub(crate) struct PingRequest;

impl RequestEncoder for PingRequest {
    fn msg_type(&self) -> u8 {
        msg_type::PING
    }

    fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_u8(0x00);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(request: &impl RequestEncoder) -> BytesMut {
        let mut buf = BytesMut::new();
        request.encode(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_connect_request_layout() {
        let request = ConnectRequest {
            url: "bee://db:9090/test".to_string(),
            application: "app".to_string(),
        };
        let buf = encode(&request);

        assert_eq!(request.msg_type(), msg_type::CONNECT);
        assert_eq!(&buf[..4], &18u32.to_be_bytes());
        assert_eq!(&buf[4..22], b"bee://db:9090/test");
        assert_eq!(&buf[22..26], &3u32.to_be_bytes());
        assert_eq!(&buf[26..], b"app");
    }

    #[test]
    fn test_connect_reply_ok() {
        let mut decoder = ConnectReplyDecoder;
        let reply = decoder.decode(Bytes::from_static(&[STATUS_OK])).unwrap();

        match reply {
            Reply::Last(reply) => {
                assert!(reply.ok);
                assert!(reply.error_detail.is_none());
            }
            _ => panic!("connect reply must be terminal"),
        }
    }

    #[test]
    fn test_connect_reply_refused_with_detail() {
        let mut payload = BytesMut::new();
        payload.put_u8(0x00);
        put_string(&mut payload, "access denied");

        let mut decoder = ConnectReplyDecoder;
        let reply = decoder.decode(payload.freeze()).unwrap();

        match reply {
            Reply::Last(reply) => {
                assert!(!reply.ok);
                assert_eq!(reply.error_detail.as_deref(), Some("access denied"));
            }
            _ => panic!("connect reply must be terminal"),
        }
    }

    #[test]
    fn test_connect_reply_empty_is_decode_error() {
        let mut decoder = ConnectReplyDecoder;
        assert!(matches!(
            decoder.decode(Bytes::new()),
            Err(BeelineError::Decode(_))
        ));
    }

    #[test]
    fn test_connect_reply_truncated_detail() {
        // Status byte plus a length prefix promising more than is present.
        let payload = Bytes::from_static(&[0x00, 0x00, 0x00, 0x00, 0x10, b'x']);
        let mut decoder = ConnectReplyDecoder;
        assert!(matches!(
            decoder.decode(payload),
            Err(BeelineError::Decode(_))
        ));
    }

    #[test]
    fn test_ping_payload_is_single_zero_byte() {
        let buf = encode(&PingRequest);
        assert_eq!(PingRequest.msg_type(), msg_type::PING);
        assert_eq!(&buf[..], &[0x00]);
    }

    #[test]
    fn test_string_roundtrip() {
        let mut buf = BytesMut::new();
        put_string(&mut buf, "héllo");
        let mut bytes = buf.freeze();
        assert_eq!(get_string(&mut bytes).unwrap(), "héllo");
        assert!(!bytes.has_remaining());
    }
}
