//! Process configuration, loaded once from the environment at startup.
//!
//! Grounded on the original's `bridger/config.py` (module-level `os.getenv`
//! globals) and the teacher's own `std::env::var(...).ok()` style in
//! `main()` — consolidated into one struct per design-notes §9 rather than
//! scattered globals.

use std::env;

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn var_opt(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// MQTT broker connection and the bridge's own write targets. Shared by the
/// ingest loop and the virtual node, since both are MQTT peers.
#[derive(Clone, Debug)]
pub struct MqttConfig {
    pub broker: String,
    pub port: u16,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub topic: String,
}

impl MqttConfig {
    pub fn from_env() -> Self {
        Self {
            broker: var_or("MQTT_BROKER", "localhost"),
            port: var_opt("MQTT_PORT").and_then(|p| p.parse().ok()).unwrap_or(1883),
            user: var_opt("MQTT_USER"),
            pass: var_opt("MQTT_PASS"),
            topic: var_or("MQTT_TOPIC", "egr/home/2/e"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct InfluxConfig {
    pub host: String,
    pub org: String,
    pub token: String,
    pub bucket: String,
    pub write_precision: String,
}

impl InfluxConfig {
    pub fn from_env() -> Self {
        Self {
            host: var_or("INFLUXDB_V2_URL", "http://localhost:8086"),
            org: var_or("INFLUXDB_V2_ORG", "bridger"),
            token: var_or("INFLUXDB_V2_TOKEN", ""),
            bucket: var_or("INFLUXDB_V2_BUCKET", "meshtastic"),
            write_precision: var_or("INFLUXDB_V2_WRITE_PRECISION", "s"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CryptoConfig {
    pub meshtastic_key: String,
}

impl CryptoConfig {
    pub fn from_env() -> Self {
        Self {
            meshtastic_key: var_or("MESHTASTIC_KEY", crate::codec::DEFAULT_MESHTASTIC_KEY),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExhookConfig {
    pub host: String,
    pub port: u16,
    pub allowed_users: Vec<String>,
}

impl ExhookConfig {
    pub fn from_env() -> Self {
        Self {
            host: var_or("EXHOOK_GRPC_HOST", "0.0.0.0"),
            port: var_opt("EXHOOK_GRPC_PORT").and_then(|p| p.parse().ok()).unwrap_or(9000),
            allowed_users: var_or("EXHOOK_ALLOWED_USERS", "bridger")
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct VirtualNodeConfig {
    pub node_id: u32,
    pub short_name: String,
    pub long_name: String,
    pub channel: String,
    pub broadcast_interval_hours: u64,
}

impl VirtualNodeConfig {
    pub fn from_env() -> Self {
        Self {
            node_id: var_opt("VIRTUAL_NODE_ID")
                .and_then(|v| parse_node_id_env(&v))
                .unwrap_or(0x42524447),
            short_name: var_or("VIRTUAL_NODE_SHORT_NAME", "BRDG"),
            long_name: var_or("VIRTUAL_NODE_LONG_NAME", "Bridger"),
            channel: var_or("VIRTUAL_NODE_CHANNEL", "LongFast"),
            broadcast_interval_hours: var_opt("VIRTUAL_NODE_BROADCAST_INTERVAL_HOURS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(2),
        }
    }
}

fn parse_node_id_env(v: &str) -> Option<u32> {
    if let Some(hex) = v.strip_prefix("0x").or_else(|| v.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        v.parse().ok()
    }
}

#[derive(Clone, Debug)]
pub struct EmqxConfig {
    pub admin_url: String,
    pub api_key: String,
    pub api_secret: String,
}

impl EmqxConfig {
    pub fn from_env() -> Self {
        Self {
            admin_url: var_or("EMQX_ADMIN_URL", "http://localhost:18083"),
            api_key: var_or("EMQX_API_KEY", ""),
            api_secret: var_or("EMQX_API_SECRET", ""),
        }
    }
}

/// Aggregate configuration; each binary constructs only the sub-structs it
/// needs, following the teacher's "read what main() uses, nothing more" style.
#[derive(Clone, Debug)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub influx: InfluxConfig,
    pub crypto: CryptoConfig,
    pub exhook: ExhookConfig,
    pub virtual_node: VirtualNodeConfig,
    pub emqx: EmqxConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            mqtt: MqttConfig::from_env(),
            influx: InfluxConfig::from_env(),
            crypto: CryptoConfig::from_env(),
            exhook: ExhookConfig::from_env(),
            virtual_node: VirtualNodeConfig::from_env(),
            emqx: EmqxConfig::from_env(),
        }
    }
}
