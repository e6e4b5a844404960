//! TELEMETRY_APP handler. Grounded on `bridger/mesh/handlers/telemetry.py`.
//!
//! Checks sub-variants in the order environment → device → power (spec
//! §4.B); only the first sub-message present on the payload is emitted.

use prost::Message;

use super::HandlerOptions;
use crate::error::ProcessingError;
use crate::model::{DeviceTelemetryPoint, Header, PowerTelemetryPoint, SensorTelemetryPoint, TypedPoint};
use crate::proto::{PowerMetrics, Telemetry};

pub fn handle(
    header: &Header,
    payload: &[u8],
    _opts: &HandlerOptions,
) -> Result<Option<Vec<TypedPoint>>, ProcessingError> {
    let telemetry = Telemetry::decode(payload)
        .map_err(|e| ProcessingError::new(format!("malformed Telemetry payload: {e}"), None))?;

    if let Some(env) = telemetry.environment_metrics {
        return Ok(Some(vec![TypedPoint::SensorTelemetry(SensorTelemetryPoint {
            header: Some(header.clone()),
            barometric_pressure: env.barometric_pressure,
            current: env.current,
            gas_resistance: env.gas_resistance,
            relative_humidity: env.relative_humidity,
            temperature: env.temperature,
            voltage: env.voltage,
            iaq: env.iaq,
            channel_utilization: None,
        })]));
    }

    if let Some(dev) = telemetry.device_metrics {
        return Ok(Some(vec![TypedPoint::DeviceTelemetry(DeviceTelemetryPoint {
            header: Some(header.clone()),
            battery_level: dev.battery_level,
            voltage: dev.voltage,
            air_util_tx: dev.air_util_tx,
            channel_utilization: dev.channel_utilization,
            uptime_seconds: dev.uptime_seconds,
        })]));
    }

    if let Some(power) = telemetry.power_metrics {
        let points = power_channels(&power)
            .into_iter()
            .map(|(channel, voltage, current)| {
                TypedPoint::PowerTelemetry(PowerTelemetryPoint {
                    header: Some(header.clone()),
                    channel,
                    voltage,
                    current,
                })
            })
            .collect::<Vec<_>>();
        if points.is_empty() {
            return Ok(None);
        }
        return Ok(Some(points));
    }

    Ok(None)
}

/// Splits a `PowerMetrics` message into `(channel, voltage, current)` triples,
/// one per channel whose voltage and current are both present (spec §8
/// property 6).
fn power_channels(power: &PowerMetrics) -> Vec<(String, f32, f32)> {
    let candidates = [
        ("ch1", power.ch1_voltage, power.ch1_current),
        ("ch2", power.ch2_voltage, power.ch2_current),
        ("ch3", power.ch3_voltage, power.ch3_current),
    ];

    candidates
        .into_iter()
        .filter_map(|(name, voltage, current)| match (voltage, current) {
            (Some(v), Some(c)) => Some((name.to_string(), v, c)),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{BROADCAST_ADDR, DeviceMetrics, EnvironmentMetrics};

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
    fn environment_metrics_take_priority() {
        let telemetry = Telemetry {
            time: 100,
            environment_metrics: Some(EnvironmentMetrics {
                temperature: Some(21.5),
                ..Default::default()
            }),
            device_metrics: Some(DeviceMetrics::default()),
            power_metrics: None,
        };
        let payload = telemetry.encode_to_vec();
        let points = handle(&header(), &payload, &HandlerOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(points.len(), 1);
        assert!(matches!(points[0], TypedPoint::SensorTelemetry(_)));
    }

    #[test]
    fn power_split_matches_spec_example() {
        let power = PowerMetrics {
            ch1_voltage: Some(5.0),
            ch1_current: Some(0.4),
            ch2_voltage: Some(6.1),
            ch2_current: Some(0.8),
            ch3_voltage: None,
            ch3_current: None,
        };
        let telemetry = Telemetry {
            time: 100,
            environment_metrics: None,
            device_metrics: None,
            power_metrics: Some(power),
        };
        let payload = telemetry.encode_to_vec();
        let points = handle(&header(), &payload, &HandlerOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(points.len(), 2);
    }

    #[test]
    fn power_split_skips_partial_channels() {
        // ch1_voltage=5, ch3_voltage=4.1, ch3_current=0.5, ch2_current=0.8 — only ch3 qualifies.
        let power = PowerMetrics {
            ch1_voltage: Some(5.0),
            ch1_current: None,
            ch2_voltage: None,
            ch2_current: Some(0.8),
            ch3_voltage: Some(4.1),
            ch3_current: Some(0.5),
        };
        let telemetry = Telemetry {
            time: 100,
            environment_metrics: None,
            device_metrics: None,
            power_metrics: Some(power),
        };
        let payload = telemetry.encode_to_vec();
        let points = handle(&header(), &payload, &HandlerOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(points.len(), 1);
        match &points[0] {
            TypedPoint::PowerTelemetry(p) => assert_eq!(p.channel, "ch3"),
            _ => panic!("expected PowerTelemetry point"),
        }
    }
}
