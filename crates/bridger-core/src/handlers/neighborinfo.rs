//! NEIGHBORINFO_APP handler. Grounded on `bridger/mesh/handlers/neighborinfo.py`.
//!
//! Expands one payload into N points, one per neighbor entry (spec §3, §8
//! property 8). Returns `None` when the neighbor list is empty.

use prost::Message;

use super::HandlerOptions;
use crate::error::ProcessingError;
use crate::model::{Header, NeighborInfoPoint, TypedPoint};
use crate::proto::NeighborInfo;

pub fn handle(
    header: &Header,
    payload: &[u8],
    _opts: &HandlerOptions,
) -> Result<Option<Vec<TypedPoint>>, ProcessingError> {
    let info = NeighborInfo::decode(payload)
        .map_err(|e| ProcessingError::new(format!("malformed NeighborInfo payload: {e}"), None))?;

    if info.neighbors.is_empty() {
        return Ok(None);
    }

    let points = info
        .neighbors
        .into_iter()
        .map(|neighbor| {
            TypedPoint::NeighborInfo(NeighborInfoPoint {
                header: header.clone(),
                node_id: info.node_id,
                last_sent_by_id: info.last_sent_by_id,
                neighbor_id: neighbor.node_id,
                snr: neighbor.snr,
                node_broadcast_interval_secs: Some(info.node_broadcast_interval_secs),
            })
        })
        .collect();

    Ok(Some(points))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{Neighbor, BROADCAST_ADDR};

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
    fn expands_two_neighbors_into_two_points() {
        let info = NeighborInfo {
            node_id: 1,
            last_sent_by_id: 1,
            node_broadcast_interval_secs: 900,
            neighbors: vec![
                Neighbor { node_id: 111, snr: Some(10.1) },
                Neighbor { node_id: 222, snr: Some(7.5) },
            ],
        };
        let payload = info.encode_to_vec();
        let points = handle(&header(), &payload, &HandlerOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(points.len(), 2);
        let ids: Vec<u32> = points
            .iter()
            .map(|p| match p {
                TypedPoint::NeighborInfo(n) => n.neighbor_id,
                _ => panic!("expected NeighborInfo point"),
            })
            .collect();
        assert_eq!(ids, vec![111, 222]);
    }

    #[test]
    fn empty_neighbor_list_produces_nothing() {
        let info = NeighborInfo {
            node_id: 1,
            last_sent_by_id: 1,
            node_broadcast_interval_secs: 900,
            neighbors: vec![],
        };
        let payload = info.encode_to_vec();
        let result = handle(&header(), &payload, &HandlerOptions::default()).unwrap();
        assert!(result.is_none());
    }
}
