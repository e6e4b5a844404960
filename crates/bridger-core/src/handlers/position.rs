//! POSITION_APP handler. Grounded on `bridger/mesh/handlers/position.py`.

use prost::Message;

use super::HandlerOptions;
use crate::error::ProcessingError;
use crate::model::{Header, PositionPoint, TypedPoint};
use crate::proto::Position;

/// Emits a point only when both coordinates are present, unless
/// `force_decode` is set. A `time` field is carried as `gps_time` to avoid
/// colliding with the store's own record timestamp (spec §3, §4.B).
pub fn handle(
    header: &Header,
    payload: &[u8],
    opts: &HandlerOptions,
) -> Result<Option<Vec<TypedPoint>>, ProcessingError> {
    let position = Position::decode(payload)
        .map_err(|e| ProcessingError::new(format!("malformed Position payload: {e}"), None))?;

    let has_coords = position.latitude_i.is_some() && position.longitude_i.is_some();
    if !has_coords && !opts.force_decode {
        return Ok(None);
    }

    Ok(Some(vec![TypedPoint::Position(PositionPoint {
        header: Some(header.clone()),
        latitude_i: position.latitude_i,
        longitude_i: position.longitude_i,
        altitude: position.altitude,
        precision_bits: position.precision_bits,
        gps_time: position.time,
        pdop: position.pdop,
        sats_in_view: position.sats_in_view,
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
    fn emits_point_with_both_coords() {
        let position = Position {
            latitude_i: Some(123456),
            longitude_i: Some(654321),
            altitude: Some(100),
            precision_bits: Some(10),
            time: Some(1609459200),
            ..Default::default()
        };
        let payload = position.encode_to_vec();
        let points = handle(&header(), &payload, &HandlerOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(points.len(), 1);
        match &points[0] {
            TypedPoint::Position(p) => {
                assert_eq!(p.gps_time, Some(1609459200));
                assert_eq!(p.latitude_i, Some(123456));
            }
            _ => panic!("expected Position point"),
        }
    }

    #[test]
    fn missing_longitude_produces_nothing() {
        let position = Position {
            latitude_i: Some(123456),
            ..Default::default()
        };
        let payload = position.encode_to_vec();
        let result = handle(&header(), &payload, &HandlerOptions::default()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn force_decode_overrides_gating() {
        let position = Position {
            latitude_i: Some(123456),
            ..Default::default()
        };
        let payload = position.encode_to_vec();
        let opts = HandlerOptions {
            force_decode: true,
            strip_text: true,
        };
        let result = handle(&header(), &payload, &opts).unwrap();
        assert!(result.is_some());
    }
}
