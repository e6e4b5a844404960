//! Time-series writer. Grounded on `bridger/influx/interfaces.py` and
//! `bridger/influx/__init__.py::create_influx_client`.

use tracing::{error, instrument, warn};

use crate::error::WriteError;
use crate::model::{AnnotationPoint, FieldValue, TypedPoint};

const ANNOTATIONS_BUCKET: &str = "annotations";

/// Resolves a `TypedPoint` to a line-protocol-shaped write and sends it
/// through a time-series backend. Kept as a trait so the ingest/virtual-node
/// binaries can be exercised against a fake in tests without a live
/// InfluxDB instance.
#[async_trait::async_trait]
pub trait TimeSeriesWriter: Send + Sync {
    async fn write(&self, points: &[TypedPoint]) -> Result<(), WriteError>;
    async fn write_annotation(&self, annotation: &AnnotationPoint) -> Result<(), WriteError>;
}

/// `influxdb2`-backed writer. Schema (tag/field keys per variant) is
/// resolved by `TypedPoint::tags`/`fields`, which is pure and needs no
/// per-type cache of its own beyond what the match arms already are.
pub struct InfluxWriter {
    client: influxdb2::Client,
    bucket: String,
    precision: WritePrecision,
}

#[derive(Clone, Copy, Debug)]
pub enum WritePrecision {
    Seconds,
    Milliseconds,
    Microseconds,
    Nanoseconds,
}

impl WritePrecision {
    pub fn from_env_str(s: &str) -> Self {
        match s {
            "ms" => WritePrecision::Milliseconds,
            "us" => WritePrecision::Microseconds,
            "ns" => WritePrecision::Nanoseconds,
            _ => WritePrecision::Seconds,
        }
    }
}

impl InfluxWriter {
    pub fn new(host: &str, org: &str, token: &str, bucket: String, precision: WritePrecision) -> Self {
        Self {
            client: influxdb2::Client::new(host, org, token),
            bucket,
            precision,
        }
    }

    fn encode_point(measurement: &str, tags: Vec<(&'static str, String)>, fields: Vec<(&'static str, FieldValue)>) -> influxdb2::models::DataPoint {
        let mut builder = influxdb2::models::DataPoint::builder(measurement);
        for (key, value) in tags {
            if value.is_empty() {
                continue;
            }
            builder = builder.tag(key, value);
        }
        for (key, value) in fields {
            builder = match value {
                FieldValue::Float(v) => builder.field(key, v),
                FieldValue::Int(v) => builder.field(key, v),
                FieldValue::UInt(v) => builder.field(key, v as i64),
                FieldValue::Str(v) => builder.field(key, v),
                FieldValue::Bool(v) => builder.field(key, v),
            };
        }
        builder.build().expect("well-formed data point")
    }
}

#[async_trait::async_trait]
impl TimeSeriesWriter for InfluxWriter {
    #[instrument(skip_all, fields(count = points.len()))]
    async fn write(&self, points: &[TypedPoint]) -> Result<(), WriteError> {
        if points.is_empty() {
            return Ok(());
        }

        let data_points: Vec<_> = points
            .iter()
            .map(|p| Self::encode_point(p.measurement(), p.tags(), p.fields()))
            .collect();

        self.send(&self.bucket, data_points).await
    }

    #[instrument(skip_all)]
    async fn write_annotation(&self, annotation: &AnnotationPoint) -> Result<(), WriteError> {
        if let Some(end) = annotation.end_time {
            if end <= annotation.start_time {
                return Err(WriteError::InvalidAnnotationLifetime);
            }
        }

        let point = TypedPoint::Annotation(annotation.clone());
        let data_point = Self::encode_point(point.measurement(), point.tags(), point.fields());
        self.send(ANNOTATIONS_BUCKET, vec![data_point]).await
    }
}

impl InfluxWriter {
    async fn send(&self, bucket: &str, points: Vec<influxdb2::models::DataPoint>) -> Result<(), WriteError> {
        use futures::stream;

        let _ = self.precision;
        match self
            .client
            .write(bucket, stream::iter(points))
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => {
                let message = e.to_string();
                if message.contains("401") || message.to_lowercase().contains("unauthorized") {
                    error!("influxdb write unauthorized, check INFLUXDB_V2 credentials");
                    Err(WriteError::Unauthorized)
                } else {
                    warn!(error = %message, "influxdb write failed");
                    Err(WriteError::Other(message))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Header, TextMessagePoint};
    use crate::proto::BROADCAST_ADDR;
    use chrono::Utc;
    use std::sync::Mutex;

    /// In-memory fake used by ingest-loop tests; records every point passed
    /// through `write` for later assertion.
    #[derive(Default)]
    pub struct FakeWriter {
        pub points: Mutex<Vec<TypedPoint>>,
        pub annotations: Mutex<Vec<AnnotationPoint>>,
    }

    #[async_trait::async_trait]
    impl TimeSeriesWriter for FakeWriter {
        async fn write(&self, points: &[TypedPoint]) -> Result<(), WriteError> {
            self.points.lock().unwrap().extend_from_slice(points);
            Ok(())
        }

        async fn write_annotation(&self, annotation: &AnnotationPoint) -> Result<(), WriteError> {
            if let Some(end) = annotation.end_time {
                if end <= annotation.start_time {
                    return Err(WriteError::InvalidAnnotationLifetime);
                }
            }
            self.annotations.lock().unwrap().push(annotation.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn fake_writer_records_points() {
        let writer = FakeWriter::default();
        let header = Header {
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
        };
        let point = TypedPoint::TextMessage(TextMessagePoint { header, text: None });
        writer.write(&[point]).await.unwrap();
        assert_eq!(writer.points.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn annotation_end_before_start_is_rejected() {
        let writer = FakeWriter::default();
        let now = Utc::now();
        let annotation = AnnotationPoint {
            node_id: "!00000001".into(),
            annotation_type: "maintenance".into(),
            author: "operator".into(),
            global_annotation: false,
            body: "bad span".into(),
            start_time: now,
            end_time: Some(now - chrono::Duration::hours(1)),
        };
        assert!(writer.write_annotation(&annotation).await.is_err());
    }
}
