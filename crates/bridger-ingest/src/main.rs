// Ingest loop: subscribes to the mesh's MQTT firehose, decodes and decrypts
// each ServiceEnvelope, dispatches it through the handler registry, dedupes,
// and writes the resulting points to the time-series store.

use std::time::Duration;

use anyhow::{Context, Result};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tracing::{error, info, instrument, warn};

use bridger_core::codec::{self, CryptoEngine};
use bridger_core::config::Config;
use bridger_core::dedup::Deduplicator;
use bridger_core::handlers::{self, HandlerOptions};
use bridger_core::model::Header;
use bridger_core::proto::ServiceEnvelope;
use bridger_core::writer::{InfluxWriter, TimeSeriesWriter, WritePrecision};

const DEDUP_CAPACITY: usize = 100;
const INITIAL_BACKOFF_MIN: Duration = Duration::from_secs(1);
const INITIAL_BACKOFF_MAX: Duration = Duration::from_secs(60);
const INITIAL_BACKOFF_ATTEMPTS: u32 = 10;
const RECONNECT_BACKOFF_MIN: Duration = Duration::from_secs(5);
const RECONNECT_BACKOFF_MAX: Duration = Duration::from_secs(120);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "bridger_ingest=info".into()))
        .json()
        .init();

    let config = Config::from_env();
    info!(broker = %config.mqtt.broker, topic = %config.mqtt.topic, "starting ingest loop");

    let writer = InfluxWriter::new(
        &config.influx.host,
        &config.influx.org,
        &config.influx.token,
        config.influx.bucket.clone(),
        WritePrecision::from_env_str(&config.influx.write_precision),
    );
    let crypto = CryptoEngine::new(&config.crypto.meshtastic_key);

    let (client, mut eventloop) = connect_with_backoff(&config).await?;
    client
        .subscribe(format!("{}/#", config.mqtt.topic.trim_end_matches("/#")), QoS::AtMostOnce)
        .await
        .context("initial subscribe failed")?;
    info!("subscribed, running");

    let mut dedup: Deduplicator<u32> = Deduplicator::new(DEDUP_CAPACITY);
    let pki_prefix = format!("{}/PKI/", config.mqtt.topic.trim_end_matches("/#"));

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if publish.topic.starts_with(&pki_prefix) {
                    continue;
                }
                handle_message(&publish.payload, &mut dedup, &crypto, &writer).await;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "mqtt connection error, reconnecting");
                reconnect_with_backoff(&mut eventloop).await;
            }
        }
    }
}

async fn connect_with_backoff(config: &Config) -> Result<(AsyncClient, rumqttc::EventLoop)> {
    let mut options = MqttOptions::new("bridger-ingest", &config.mqtt.broker, config.mqtt.port);
    options.set_keep_alive(Duration::from_secs(30));
    if let (Some(user), Some(pass)) = (&config.mqtt.user, &config.mqtt.pass) {
        options.set_credentials(user, pass);
    }

    let mut backoff = INITIAL_BACKOFF_MIN;
    let mut last_err = None;
    for attempt in 1..=INITIAL_BACKOFF_ATTEMPTS {
        let (client, eventloop) = AsyncClient::new(options.clone(), 100);
        match client.subscribe("$SYS/#", QoS::AtMostOnce).await {
            Ok(()) => return Ok((client, eventloop)),
            Err(e) => {
                warn!(attempt, error = %e, "mqtt connect attempt failed");
                last_err = Some(e);
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(INITIAL_BACKOFF_MAX);
            }
        }
    }
    Err(anyhow::anyhow!("mqtt connect failed after {INITIAL_BACKOFF_ATTEMPTS} attempts: {last_err:?}"))
}

async fn reconnect_with_backoff(_eventloop: &mut rumqttc::EventLoop) {
    // rumqttc's EventLoop reconnects internally on the next poll(); this is
    // the cooperative backoff window matching spec §4.E's min 5s / max 120s.
    tokio::time::sleep(RECONNECT_BACKOFF_MIN.min(RECONNECT_BACKOFF_MAX)).await;
}

#[instrument(skip_all)]
async fn handle_message(
    payload: &[u8],
    dedup: &mut Deduplicator<u32>,
    crypto: &CryptoEngine,
    writer: &InfluxWriter,
) {
    let mut envelope = match codec::decode_envelope(payload) {
        Ok(envelope) => envelope,
        Err(e) => {
            let text = String::from_utf8_lossy(payload);
            warn!(error = %e, payload = %text, "failed to decode envelope, dropping");
            return;
        }
    };

    let Some(packet) = envelope.packet.clone() else {
        return;
    };

    if !dedup.should_process(packet.id) {
        return;
    }

    if let Err(e) = codec::decrypt(&mut envelope, crypto) {
        info!(error = %e, "dropping undecryptable packet");
        return;
    }

    match dispatch_and_write(&envelope, writer).await {
        Ok(()) => {}
        Err(e) => info!(error = %e, "dropping packet"),
    }
}

async fn dispatch_and_write(envelope: &ServiceEnvelope, writer: &InfluxWriter) -> Result<(), bridger_core::error::ProcessingError> {
    let (portnum, _name, payload) = codec::classify(envelope)?;
    let packet = envelope.packet.as_ref().expect("classify succeeded, packet present");

    let header = Header {
        channel_id: envelope.channel_id.clone(),
        gateway_id: envelope.gateway_id.clone(),
        from: packet.from,
        to: packet.to,
        packet_id: packet.id,
        rx_time: packet.rx_time,
        rx_snr: packet.rx_snr,
        rx_rssi: packet.rx_rssi,
        hop_limit: packet.hop_limit,
        hop_start: packet.hop_start,
    };

    let points = handlers::dispatch(&header, portnum, payload, &HandlerOptions::default())?;
    if points.is_empty() {
        return Ok(());
    }

    if let Err(e) = writer.write(&points).await {
        error!(error = %e, "time-series write failed");
    }
    Ok(())
}
