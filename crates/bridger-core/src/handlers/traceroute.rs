//! TRACEROUTE_APP handler. Grounded on `bridger/mesh/handlers/traceroute.py`.
//!
//! The source leaves the route-flattening policy as a TODO; this carries
//! `route`/`route_back` as single multi-hop fields on one point rather than
//! expanding per hop (decided in SPEC_FULL.md §4).

use prost::Message;

use super::HandlerOptions;
use crate::error::ProcessingError;
use crate::model::{Header, TraceroutePoint, TypedPoint};
use crate::proto::RouteDiscovery;

pub fn handle(
    header: &Header,
    payload: &[u8],
    _opts: &HandlerOptions,
) -> Result<Option<Vec<TypedPoint>>, ProcessingError> {
    let route = RouteDiscovery::decode(payload)
        .map_err(|e| ProcessingError::new(format!("malformed RouteDiscovery payload: {e}"), None))?;

    Ok(Some(vec![TypedPoint::Traceroute(TraceroutePoint {
        header: header.clone(),
        route: route.route,
        snr_towards: route.snr_towards,
        route_back: route.route_back,
        snr_back: route.snr_back,
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
    fn emits_one_point_with_both_routes() {
        let route = RouteDiscovery {
            route: vec![1, 2],
            snr_towards: vec![10, 12],
            route_back: vec![2, 1],
            snr_back: vec![11, 9],
        };
        let payload = route.encode_to_vec();
        let points = handle(&header(), &payload, &HandlerOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(points.len(), 1);
        match &points[0] {
            TypedPoint::Traceroute(p) => {
                assert_eq!(p.route, vec![1, 2]);
                assert_eq!(p.route_back, vec![2, 1]);
            }
            _ => panic!("expected Traceroute point"),
        }
    }
}
