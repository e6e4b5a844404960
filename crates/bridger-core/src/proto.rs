//! Hand-written Meshtastic protobuf message types.
//!
//! Mirrors the subset of `meshtastic/protobuf/*.proto` the bridge actually
//! touches. Defined directly with `prost::Message` derives rather than
//! generated from a checked-in `.proto` file, the way the teacher's
//! `backend/src/main.rs` defines `SinyalistPacket` inline for fast iteration;
//! `build.rs` keeps the `prost_build::compile_protos` call commented out as
//! the production escape hatch.

/// Port numbers this bridge knows how to classify. Only the ports with a
/// registered handler matter; everything else is an unknown port.
pub mod port_num {
    pub const POSITION_APP: i32 = 3;
    pub const NODEINFO_APP: i32 = 4;
    pub const TEXT_MESSAGE_APP: i32 = 1;
    pub const TELEMETRY_APP: i32 = 67;
    pub const TRACEROUTE_APP: i32 = 70;
    pub const NEIGHBORINFO_APP: i32 = 71;

    pub fn name(portnum: i32) -> &'static str {
        match portnum {
            POSITION_APP => "POSITION_APP",
            NODEINFO_APP => "NODEINFO_APP",
            TEXT_MESSAGE_APP => "TEXT_MESSAGE_APP",
            TELEMETRY_APP => "TELEMETRY_APP",
            TRACEROUTE_APP => "TRACEROUTE_APP",
            NEIGHBORINFO_APP => "NEIGHBORINFO_APP",
            _ => "UNKNOWN_APP",
        }
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Data {
    #[prost(int32, tag = "1")]
    pub portnum: i32,
    #[prost(bytes = "vec", tag = "2")]
    pub payload: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MeshPacket {
    #[prost(uint32, tag = "1")]
    pub from: u32,
    #[prost(uint32, tag = "2")]
    pub to: u32,
    #[prost(uint32, tag = "6")]
    pub id: u32,
    #[prost(fixed32, tag = "9")]
    pub rx_time: u32,
    #[prost(float, tag = "10")]
    pub rx_snr: f32,
    #[prost(int32, tag = "11")]
    pub rx_rssi: i32,
    #[prost(uint32, tag = "12")]
    pub hop_limit: u32,
    #[prost(uint32, tag = "13")]
    pub hop_start: u32,
    #[prost(message, optional, tag = "4")]
    pub decoded: Option<Data>,
    #[prost(bytes = "vec", tag = "5")]
    pub encrypted: Vec<u8>,
}

pub const BROADCAST_ADDR: u32 = 0xFFFFFFFF;

#[derive(Clone, PartialEq, prost::Message)]
pub struct ServiceEnvelope {
    #[prost(message, optional, tag = "1")]
    pub packet: Option<MeshPacket>,
    #[prost(string, tag = "2")]
    pub channel_id: String,
    #[prost(string, tag = "3")]
    pub gateway_id: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct User {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub long_name: String,
    #[prost(string, tag = "3")]
    pub short_name: String,
    #[prost(uint32, tag = "5")]
    pub hw_model: u32,
    #[prost(uint32, tag = "6")]
    pub role: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Position {
    #[prost(sfixed32, optional, tag = "1")]
    pub latitude_i: Option<i32>,
    #[prost(sfixed32, optional, tag = "2")]
    pub longitude_i: Option<i32>,
    #[prost(int32, optional, tag = "3")]
    pub altitude: Option<i32>,
    #[prost(fixed32, optional, tag = "4")]
    pub time: Option<u32>,
    #[prost(uint32, optional, tag = "5")]
    pub precision_bits: Option<u32>,
    #[prost(uint32, optional, tag = "6")]
    pub pdop: Option<u32>,
    #[prost(uint32, optional, tag = "7")]
    pub sats_in_view: Option<u32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct EnvironmentMetrics {
    #[prost(float, optional, tag = "1")]
    pub temperature: Option<f32>,
    #[prost(float, optional, tag = "2")]
    pub relative_humidity: Option<f32>,
    #[prost(float, optional, tag = "3")]
    pub barometric_pressure: Option<f32>,
    #[prost(float, optional, tag = "4")]
    pub gas_resistance: Option<f32>,
    #[prost(float, optional, tag = "5")]
    pub voltage: Option<f32>,
    #[prost(float, optional, tag = "6")]
    pub current: Option<f32>,
    #[prost(uint32, optional, tag = "7")]
    pub iaq: Option<u32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DeviceMetrics {
    #[prost(uint32, optional, tag = "1")]
    pub battery_level: Option<u32>,
    #[prost(float, optional, tag = "2")]
    pub voltage: Option<f32>,
    #[prost(float, optional, tag = "3")]
    pub channel_utilization: Option<f32>,
    #[prost(float, optional, tag = "4")]
    pub air_util_tx: Option<f32>,
    #[prost(uint32, optional, tag = "5")]
    pub uptime_seconds: Option<u32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PowerMetrics {
    #[prost(float, optional, tag = "1")]
    pub ch1_voltage: Option<f32>,
    #[prost(float, optional, tag = "2")]
    pub ch1_current: Option<f32>,
    #[prost(float, optional, tag = "3")]
    pub ch2_voltage: Option<f32>,
    #[prost(float, optional, tag = "4")]
    pub ch2_current: Option<f32>,
    #[prost(float, optional, tag = "5")]
    pub ch3_voltage: Option<f32>,
    #[prost(float, optional, tag = "6")]
    pub ch3_current: Option<f32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Telemetry {
    #[prost(fixed32, tag = "1")]
    pub time: u32,
    #[prost(message, optional, tag = "2")]
    pub device_metrics: Option<DeviceMetrics>,
    #[prost(message, optional, tag = "3")]
    pub environment_metrics: Option<EnvironmentMetrics>,
    #[prost(message, optional, tag = "10")]
    pub power_metrics: Option<PowerMetrics>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Neighbor {
    #[prost(uint32, tag = "1")]
    pub node_id: u32,
    #[prost(float, optional, tag = "2")]
    pub snr: Option<f32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct NeighborInfo {
    #[prost(uint32, tag = "1")]
    pub node_id: u32,
    #[prost(uint32, tag = "2")]
    pub last_sent_by_id: u32,
    #[prost(uint32, tag = "3")]
    pub node_broadcast_interval_secs: u32,
    #[prost(message, repeated, tag = "4")]
    pub neighbors: Vec<Neighbor>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RouteDiscovery {
    #[prost(uint32, repeated, tag = "1")]
    pub route: Vec<u32>,
    #[prost(int32, repeated, tag = "2")]
    pub snr_towards: Vec<i32>,
    #[prost(uint32, repeated, tag = "3")]
    pub route_back: Vec<u32>,
    #[prost(int32, repeated, tag = "4")]
    pub snr_back: Vec<i32>,
}
