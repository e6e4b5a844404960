//! The `TypedPoint` sum type and its schema reflection.
//!
//! Grounded on `bridger/dataclasses.py`: the source uses a dataclass
//! inheritance hierarchy with field metadata (`influx_kind: tag|field`) read
//! by reflection; here each variant is a plain struct and the tag/field split
//! is encoded directly in `tags()`/`fields()` rather than discovered at
//! runtime, per the "canonical implementation" direction in the design notes.

use chrono::{DateTime, Utc};

/// A scalar value written to a field. Tags are always strings.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Int(i64),
    UInt(u64),
    Str(String),
    Bool(bool),
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        FieldValue::Float(v as f64)
    }
}
impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}
impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Int(v as i64)
    }
}
impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::UInt(v as u64)
    }
}
impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Str(v)
    }
}
impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

/// Common header shared by every packet-derived point (spec §3, "Common
/// header tags/fields").
#[derive(Clone, Debug, PartialEq)]
pub struct Header {
    pub channel_id: String,
    pub gateway_id: String,
    pub from: u32,
    pub to: u32,
    pub packet_id: u32,
    pub rx_time: u32,
    pub rx_snr: f32,
    pub rx_rssi: i32,
    pub hop_limit: u32,
    pub hop_start: u32,
}

impl Header {
    fn tags(&self) -> Vec<(&'static str, String)> {
        vec![
            ("channel_id", self.channel_id.clone()),
            ("gateway_id", self.gateway_id.clone()),
            ("_from", crate::node_id::hex_with_bang(self.from)),
            ("to", crate::node_id::hex_with_bang(self.to)),
        ]
    }

    fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("packet_id", self.packet_id.into()),
            ("rx_time", self.rx_time.into()),
            ("rx_snr", self.rx_snr.into()),
            ("rx_rssi", self.rx_rssi.into()),
            ("hop_limit", self.hop_limit.into()),
            ("hop_start", self.hop_start.into()),
        ]
    }
}

/// Appends `(key, value)` to `out` only when `value` is `Some`, matching the
/// "omit missing, never write zero" encoding policy (spec §4.D).
fn push_opt<T: Into<FieldValue>>(out: &mut Vec<(&'static str, FieldValue)>, key: &'static str, value: Option<T>) {
    if let Some(v) = value {
        out.push((key, v.into()));
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NodeInfoPoint {
    pub header: Header,
    pub long_name: String,
    pub short_name: String,
    pub hw_model: u32,
    pub role: u32,
    pub id: String,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct PositionPoint {
    pub header: Option<Header>,
    pub latitude_i: Option<i32>,
    pub longitude_i: Option<i32>,
    pub altitude: Option<i32>,
    pub precision_bits: Option<u32>,
    pub gps_time: Option<u32>,
    pub pdop: Option<u32>,
    pub sats_in_view: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct SensorTelemetryPoint {
    pub header: Option<Header>,
    pub barometric_pressure: Option<f32>,
    pub current: Option<f32>,
    pub gas_resistance: Option<f32>,
    pub relative_humidity: Option<f32>,
    pub temperature: Option<f32>,
    pub voltage: Option<f32>,
    pub iaq: Option<u32>,
    pub channel_utilization: Option<f32>,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct DeviceTelemetryPoint {
    pub header: Option<Header>,
    pub battery_level: Option<u32>,
    pub voltage: Option<f32>,
    pub air_util_tx: Option<f32>,
    pub channel_utilization: Option<f32>,
    pub uptime_seconds: Option<u32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PowerTelemetryPoint {
    pub header: Option<Header>,
    pub channel: String,
    pub voltage: f32,
    pub current: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NeighborInfoPoint {
    pub header: Header,
    pub node_id: u32,
    pub last_sent_by_id: u32,
    pub neighbor_id: u32,
    pub snr: Option<f32>,
    pub node_broadcast_interval_secs: Option<u32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextMessagePoint {
    pub header: Header,
    pub text: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TraceroutePoint {
    pub header: Header,
    pub route: Vec<u32>,
    pub snr_towards: Vec<i32>,
    pub route_back: Vec<u32>,
    pub snr_back: Vec<i32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnnotationPoint {
    pub node_id: String,
    pub annotation_type: String,
    pub author: String,
    pub global_annotation: bool,
    pub body: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypedPoint {
    NodeInfo(NodeInfoPoint),
    Position(PositionPoint),
    SensorTelemetry(SensorTelemetryPoint),
    DeviceTelemetry(DeviceTelemetryPoint),
    PowerTelemetry(PowerTelemetryPoint),
    NeighborInfo(NeighborInfoPoint),
    TextMessage(TextMessagePoint),
    Traceroute(TraceroutePoint),
    Annotation(AnnotationPoint),
}

impl TypedPoint {
    pub fn measurement(&self) -> &'static str {
        match self {
            TypedPoint::NodeInfo(_) => "node",
            TypedPoint::Position(_) => "position",
            TypedPoint::SensorTelemetry(_) => "sensor",
            TypedPoint::DeviceTelemetry(_) => "battery",
            TypedPoint::PowerTelemetry(_) => "power",
            TypedPoint::NeighborInfo(_) => "neighbor",
            TypedPoint::TextMessage(_) => "message",
            TypedPoint::Traceroute(_) => "traceroute",
            TypedPoint::Annotation(_) => "annotation",
        }
    }

    pub fn tags(&self) -> Vec<(&'static str, String)> {
        match self {
            TypedPoint::NodeInfo(p) => {
                let mut tags = p.header.tags();
                tags.push(("long_name", p.long_name.clone()));
                tags.push(("short_name", p.short_name.clone()));
                tags.push(("hw_model", p.hw_model.to_string()));
                tags.push(("role", p.role.to_string()));
                tags
            }
            TypedPoint::Position(p) => p.header.as_ref().map(Header::tags).unwrap_or_default(),
            TypedPoint::SensorTelemetry(p) => p.header.as_ref().map(Header::tags).unwrap_or_default(),
            TypedPoint::DeviceTelemetry(p) => p.header.as_ref().map(Header::tags).unwrap_or_default(),
            TypedPoint::PowerTelemetry(p) => {
                let mut tags = p.header.as_ref().map(Header::tags).unwrap_or_default();
                tags.push(("channel", p.channel.clone()));
                tags
            }
            TypedPoint::NeighborInfo(p) => {
                let mut tags = p.header.tags();
                tags.push(("node_id", crate::node_id::hex_with_bang(p.node_id)));
                tags.push(("last_sent_by_id", crate::node_id::hex_with_bang(p.last_sent_by_id)));
                tags.push(("neighbor_id", crate::node_id::hex_with_bang(p.neighbor_id)));
                tags
            }
            TypedPoint::TextMessage(p) => p.header.tags(),
            TypedPoint::Traceroute(p) => p.header.tags(),
            TypedPoint::Annotation(p) => vec![
                ("node_id", p.node_id.clone()),
                ("annotation_type", p.annotation_type.clone()),
                ("author", p.author.clone()),
                ("global_annotation", p.global_annotation.to_string()),
            ],
        }
    }

    pub fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        match self {
            TypedPoint::NodeInfo(p) => {
                let mut fields = p.header.fields();
                fields.push(("id", p.id.clone().into()));
                fields
            }
            TypedPoint::Position(p) => {
                let mut fields = p.header.as_ref().map(Header::fields).unwrap_or_default();
                push_opt(&mut fields, "latitude_i", p.latitude_i);
                push_opt(&mut fields, "longitude_i", p.longitude_i);
                push_opt(&mut fields, "altitude", p.altitude);
                push_opt(&mut fields, "precision_bits", p.precision_bits);
                push_opt(&mut fields, "gps_time", p.gps_time);
                push_opt(&mut fields, "pdop", p.pdop);
                push_opt(&mut fields, "sats_in_view", p.sats_in_view);
                fields
            }
            TypedPoint::SensorTelemetry(p) => {
                let mut fields = p.header.as_ref().map(Header::fields).unwrap_or_default();
                push_opt(&mut fields, "barometric_pressure", p.barometric_pressure);
                push_opt(&mut fields, "current", p.current);
                push_opt(&mut fields, "gas_resistance", p.gas_resistance);
                push_opt(&mut fields, "relative_humidity", p.relative_humidity);
                push_opt(&mut fields, "temperature", p.temperature);
                push_opt(&mut fields, "voltage", p.voltage);
                push_opt(&mut fields, "iaq", p.iaq);
                push_opt(&mut fields, "channel_utilization", p.channel_utilization);
                fields
            }
            TypedPoint::DeviceTelemetry(p) => {
                let mut fields = p.header.as_ref().map(Header::fields).unwrap_or_default();
                push_opt(&mut fields, "battery_level", p.battery_level);
                push_opt(&mut fields, "voltage", p.voltage);
                push_opt(&mut fields, "air_util_tx", p.air_util_tx);
                push_opt(&mut fields, "channel_utilization", p.channel_utilization);
                push_opt(&mut fields, "uptime_seconds", p.uptime_seconds);
                fields
            }
            TypedPoint::PowerTelemetry(p) => {
                let mut fields = p.header.as_ref().map(Header::fields).unwrap_or_default();
                fields.push(("voltage", p.voltage.into()));
                fields.push(("current", p.current.into()));
                fields
            }
            TypedPoint::NeighborInfo(p) => {
                let mut fields = p.header.fields();
                push_opt(&mut fields, "snr", p.snr);
                push_opt(&mut fields, "node_broadcast_interval_secs", p.node_broadcast_interval_secs);
                fields
            }
            TypedPoint::TextMessage(p) => {
                let mut fields = p.header.fields();
                if let Some(text) = &p.text {
                    fields.push(("text", text.clone().into()));
                }
                fields
            }
            TypedPoint::Traceroute(p) => {
                let mut fields = p.header.fields();
                fields.push(("route", join_hops(&p.route).into()));
                fields.push(("snr_towards", join_snrs(&p.snr_towards).into()));
                fields.push(("route_back", join_hops(&p.route_back).into()));
                fields.push(("snr_back", join_snrs(&p.snr_back).into()));
                fields
            }
            TypedPoint::Annotation(p) => {
                let mut fields = vec![
                    ("body", FieldValue::Str(p.body.clone())),
                    ("start_time", FieldValue::Str(p.start_time.to_rfc3339())),
                ];
                if let Some(end) = p.end_time {
                    fields.push(("end_time", FieldValue::Str(end.to_rfc3339())));
                }
                fields
            }
        }
    }
}

fn join_hops(hops: &[u32]) -> String {
    hops.iter()
        .map(|h| crate::node_id::hex_with_bang(*h))
        .collect::<Vec<_>>()
        .join(",")
}

fn join_snrs(snrs: &[i32]) -> String {
    snrs.iter().map(i32::to_string).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Header {
        Header {
            channel_id: "LongFast".into(),
            gateway_id: "!deadbeef".into(),
            from: 1,
            to: crate::proto::BROADCAST_ADDR,
            packet_id: 42,
            rx_time: 1000,
            rx_snr: 5.5,
            rx_rssi: -90,
            hop_limit: 3,
            hop_start: 3,
        }
    }

    #[test]
    fn node_info_measurement_and_tags() {
        let point = TypedPoint::NodeInfo(NodeInfoPoint {
            header: header(),
            long_name: "Test Node".into(),
            short_name: "TEST".into(),
            hw_model: 9,
            role: 1,
            id: "!00000001".into(),
        });
        assert_eq!(point.measurement(), "node");
        let tags: std::collections::HashMap<_, _> = point.tags().into_iter().collect();
        assert_eq!(tags["long_name"], "Test Node");
        assert_eq!(tags["short_name"], "TEST");
    }

    #[test]
    fn position_omits_missing_fields() {
        let point = TypedPoint::Position(PositionPoint {
            header: Some(header()),
            latitude_i: Some(123456),
            longitude_i: Some(654321),
            gps_time: Some(1609459200),
            ..Default::default()
        });
        let fields: std::collections::HashMap<_, _> = point.fields().into_iter().collect();
        assert!(fields.contains_key("latitude_i"));
        assert!(fields.contains_key("gps_time"));
        assert!(!fields.contains_key("altitude"));
        assert!(!fields.contains_key("pdop"));
    }

    #[test]
    fn power_telemetry_carries_channel_tag() {
        let point = TypedPoint::PowerTelemetry(PowerTelemetryPoint {
            header: Some(header()),
            channel: "ch1".into(),
            voltage: 5.0,
            current: 0.4,
        });
        assert_eq!(point.measurement(), "power");
        let tags: std::collections::HashMap<_, _> = point.tags().into_iter().collect();
        assert_eq!(tags["channel"], "ch1");
    }

    #[test]
    fn text_message_field_omitted_when_elided() {
        let point = TypedPoint::TextMessage(TextMessagePoint {
            header: header(),
            text: None,
        });
        let fields: std::collections::HashMap<_, _> = point.fields().into_iter().collect();
        assert!(!fields.contains_key("text"));
    }

    #[test]
    fn annotation_requires_end_after_start() {
        let start = Utc::now();
        let point = AnnotationPoint {
            node_id: "!00000001".into(),
            annotation_type: "maintenance".into(),
            author: "operator".into(),
            global_annotation: false,
            body: "gateway offline for upgrade".into(),
            start_time: start,
            end_time: Some(start + chrono::Duration::hours(1)),
        };
        assert!(point.end_time.unwrap() > point.start_time);
    }

    #[test]
    fn traceroute_hops_join_as_hex() {
        let point = TypedPoint::Traceroute(TraceroutePoint {
            header: header(),
            route: vec![1, 2],
            snr_towards: vec![10, 12],
            route_back: vec![2, 1],
            snr_back: vec![11, 9],
        });
        let fields: std::collections::HashMap<_, _> = point.fields().into_iter().collect();
        assert_eq!(
            fields["route"],
            FieldValue::Str("!00000001,!00000002".to_string())
        );
    }
}
