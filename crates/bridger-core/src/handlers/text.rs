//! TEXT_MESSAGE_APP handler. Grounded on `bridger/mesh/handlers/text.py`.
//!
//! The payload is plain UTF-8, not a protobuf message. The documented default
//! is to elide the body (`strip_text = true`); the virtual node overrides
//! this to `false` since it needs to read the text to build a reply.

use super::HandlerOptions;
use crate::error::ProcessingError;
use crate::model::{Header, TextMessagePoint, TypedPoint};

pub fn handle(
    header: &Header,
    payload: &[u8],
    opts: &HandlerOptions,
) -> Result<Option<Vec<TypedPoint>>, ProcessingError> {
    let text = String::from_utf8(payload.to_vec())
        .map_err(|e| ProcessingError::new(format!("text message payload is not UTF-8: {e}"), None))?;

    Ok(Some(vec![TypedPoint::TextMessage(TextMessagePoint {
        header: header.clone(),
        text: if opts.strip_text { None } else { Some(text) },
    })]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::BROADCAST_ADDR;

    fn header() -> Header {
        Header {
            channel_id: "LongFast".into(),
            gateway_id: "!deadbeef".into(),
            from: 1,
            to: BROADCAST_ADDR,
            packet_id: 1,
            rx_time: 0,
            rx_snr: 0.0,
            rx_rssi: 0,
            hop_limit: 3,
            hop_start: 3,
        }
    }

    #[test]
    fn default_elides_text() {
        let points = handle(&header(), b"hello mesh", &HandlerOptions::default())
            .unwrap()
            .unwrap();
        match &points[0] {
            TypedPoint::TextMessage(p) => assert!(p.text.is_none()),
            _ => panic!("expected TextMessage point"),
        }
    }

    #[test]
    fn strip_text_false_retains_body() {
        let opts = HandlerOptions {
            force_decode: false,
            strip_text: false,
        };
        let points = handle(&header(), b"hello mesh", &opts).unwrap().unwrap();
        match &points[0] {
            TypedPoint::TextMessage(p) => assert_eq!(p.text.as_deref(), Some("hello mesh")),
            _ => panic!("expected TextMessage point"),
        }
    }
}
