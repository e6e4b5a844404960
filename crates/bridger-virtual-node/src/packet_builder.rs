//! Builds outbound ServiceEnvelopes for the virtual node. Grounded on
//! `bridger/virtual_node/packet_builder.py`.

use prost::Message;

use bridger_core::config::VirtualNodeConfig;
use bridger_core::node_id;
use bridger_core::proto::{port_num, Data, MeshPacket, ServiceEnvelope, User, BROADCAST_ADDR};

const VIRTUAL_NODE_HW_MODEL: u32 = 255; // PRIVATE_HW
const VIRTUAL_NODE_ROLE: u32 = 3; // ROUTER

/// Packet ids are derived from wall-clock time masked to 32 bits, matching
/// `VirtualPacketBuilder._generate_packet_id`.
pub fn next_packet_id(now_unix: u64) -> u32 {
    (now_unix & 0xFFFF_FFFF) as u32
}

fn envelope(config: &VirtualNodeConfig, to_node: u32, packet_id: u32, rx_time: u32, portnum: i32, payload: Vec<u8>) -> ServiceEnvelope {
    let data = Data { portnum, payload };
    let packet = MeshPacket {
        from: config.node_id,
        to: to_node,
        id: packet_id,
        rx_time,
        rx_snr: 0.0,
        rx_rssi: 0,
        hop_limit: 0,
        hop_start: 0,
        decoded: Some(data),
        encrypted: Vec::new(),
    };
    ServiceEnvelope {
        packet: Some(packet),
        channel_id: config.channel.clone(),
        gateway_id: node_id::hex_with_bang(config.node_id),
    }
}

pub fn build_nodeinfo(config: &VirtualNodeConfig, packet_id: u32, rx_time: u32) -> ServiceEnvelope {
    let user = User {
        id: node_id::hex_with_bang(config.node_id),
        long_name: config.long_name.clone(),
        short_name: config.short_name.clone(),
        hw_model: VIRTUAL_NODE_HW_MODEL,
        role: VIRTUAL_NODE_ROLE,
    };
    envelope(config, BROADCAST_ADDR, packet_id, rx_time, port_num::NODEINFO_APP, user.encode_to_vec())
}

pub fn build_text_message(config: &VirtualNodeConfig, to_node: u32, packet_id: u32, rx_time: u32, text: &str) -> ServiceEnvelope {
    envelope(config, to_node, packet_id, rx_time, port_num::TEXT_MESSAGE_APP, text.as_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> VirtualNodeConfig {
        VirtualNodeConfig {
            node_id: 0x42524447,
            short_name: "BRDG".into(),
            long_name: "Bridger".into(),
            channel: "LongFast".into(),
            broadcast_interval_hours: 2,
        }
    }

    #[test]
    fn nodeinfo_envelope_carries_self_identity() {
        let envelope = build_nodeinfo(&config(), 1, 1000);
        let packet = envelope.packet.unwrap();
        assert_eq!(packet.from, 0x42524447);
        assert_eq!(packet.to, BROADCAST_ADDR);
        let data = packet.decoded.unwrap();
        assert_eq!(data.portnum, port_num::NODEINFO_APP);
        let user = User::decode(data.payload.as_slice()).unwrap();
        assert_eq!(user.short_name, "BRDG");
    }

    #[test]
    fn text_message_addresses_reply_to_sender() {
        let envelope = build_text_message(&config(), 0x1a2b3c4d, 2, 2000, "hello");
        let packet = envelope.packet.unwrap();
        assert_eq!(packet.to, 0x1a2b3c4d);
        let data = packet.decoded.unwrap();
        assert_eq!(data.payload, b"hello");
    }

    #[test]
    fn packet_id_masks_to_32_bits() {
        assert_eq!(next_packet_id(0x1_0000_0005), 5);
    }
}
