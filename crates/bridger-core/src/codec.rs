//! Envelope decode, AES-CTR decryption, and port classification.
//!
//! Pure functions — no I/O. Grounded on `bridger/mesh/__init__.py`
//! (`PBPacketProcessor`) and `bridger/crypto.py` (`CryptoEngine`).

use aes::Aes128;
use base64::Engine;
use cipher::{KeyIvInit, StreamCipher};
use prost::Message;

use crate::error::{DecodeError, ProcessingError};
use crate::proto::{self, port_num, Data, ServiceEnvelope};

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

/// The community-default Meshtastic channel PSK, base64-encoded.
pub const DEFAULT_MESHTASTIC_KEY: &str = "1PG7OiApB1nwvP+rz05pAQ==";

pub const PKI_CHANNEL: &str = "PKI";

/// Strict protobuf decode of a raw MQTT payload into a `ServiceEnvelope`.
pub fn decode_envelope(bytes: &[u8]) -> Result<ServiceEnvelope, DecodeError> {
    Ok(ServiceEnvelope::decode(bytes)?)
}

/// AES-128-CTR engine keyed by the shared channel secret.
pub struct CryptoEngine {
    key: [u8; 16],
}

impl CryptoEngine {
    /// Builds the engine from a base64-encoded 16-byte key.
    pub fn new(key_base64: &str) -> Self {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(key_base64)
            .expect("MESHTASTIC_KEY must be valid base64");
        let mut key = [0u8; 16];
        key.copy_from_slice(&decoded[..16]);
        Self { key }
    }

    /// Nonce is `packet_id` (LE u64) concatenated with `from` (LE u64) — this
    /// byte order is part of the wire contract and must not change.
    fn nonce(from_node: u32, packet_id: u32) -> [u8; 16] {
        let mut nonce = [0u8; 16];
        nonce[0..8].copy_from_slice(&(packet_id as u64).to_le_bytes());
        nonce[8..16].copy_from_slice(&(from_node as u64).to_le_bytes());
        nonce
    }

    pub fn decrypt(&self, from_node: u32, packet_id: u32, encrypted: &[u8]) -> Vec<u8> {
        let nonce = Self::nonce(from_node, packet_id);
        let mut buf = encrypted.to_vec();
        let mut cipher = Aes128Ctr::new(&self.key.into(), &nonce.into());
        cipher.apply_keystream(&mut buf);
        buf
    }

    pub fn encrypt(&self, from_node: u32, packet_id: u32, plaintext: &[u8]) -> Vec<u8> {
        // CTR mode is symmetric: encryption and decryption are the same operation.
        self.decrypt(from_node, packet_id, plaintext)
    }
}

impl Default for CryptoEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MESHTASTIC_KEY)
    }
}

/// Decrypts `envelope`'s packet in place when it carries an `encrypted` blob
/// on a non-PKI channel, writing the recovered `Data` into `decoded`.
///
/// Returns `Ok(false)` when there was nothing to decrypt, `Ok(true)` on a
/// successful decrypt, and `Err` for a PKI channel or a parse failure of the
/// decrypted bytes.
pub fn decrypt(
    envelope: &mut ServiceEnvelope,
    engine: &CryptoEngine,
) -> Result<bool, ProcessingError> {
    let channel_id = envelope.channel_id.clone();
    let Some(packet) = envelope.packet.as_mut() else {
        return Ok(false);
    };

    if packet.encrypted.is_empty() {
        return Ok(false);
    }

    if channel_id == PKI_CHANNEL {
        return Err(ProcessingError::new(
            "cannot decrypt PKI channel messages",
            None,
        ));
    }

    let plaintext = engine.decrypt(packet.from, packet.id, &packet.encrypted);
    let data = Data::decode(plaintext.as_slice())
        .map_err(|e| ProcessingError::new(format!("error decrypting message: {e}"), None))?;
    packet.decoded = Some(data);
    Ok(true)
}

/// Looks up the port number carried by a decoded envelope, returning the port,
/// a human-friendly name, and the raw payload bytes.
///
/// Fails with a `ProcessingError` (distinguishable from a `DecodeError`) when
/// the envelope carries no decoded payload (e.g. a PKI packet we refused to
/// decrypt) or when the port has no registered handler.
pub fn classify(envelope: &ServiceEnvelope) -> Result<(i32, &'static str, &[u8]), ProcessingError> {
    let packet = envelope
        .packet
        .as_ref()
        .ok_or_else(|| ProcessingError::new("envelope has no packet", None))?;

    let data = packet.decoded.as_ref().ok_or_else(|| {
        if envelope.channel_id == PKI_CHANNEL {
            ProcessingError::new("cannot decrypt PKI channel messages", None)
        } else {
            ProcessingError::new("packet has no decoded payload", None)
        }
    })?;

    if !crate::handlers::is_registered(data.portnum) {
        return Err(ProcessingError::new(
            format!("no handler registered for port {}", data.portnum),
            Some(data.portnum),
        ));
    }

    Ok((data.portnum, port_num::name(data.portnum), &data.payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test vector from `bridger/tests/test_crypto.py::test_nonce_generation`
    /// and `test_decrypt`.
    #[test]
    fn nonce_matches_test_vector() {
        let nonce = CryptoEngine::nonce(1129710788, 812977943);
        let expected: [u8; 16] = [
            0x17, 0x0f, 0x75, 0x30, 0x00, 0x00, 0x00, 0x00, 0xc4, 0x04, 0x56, 0x43, 0x00, 0x00,
            0x00, 0x00,
        ];
        assert_eq!(nonce, expected);
    }

    #[test]
    fn decrypt_matches_test_vector() {
        let engine = CryptoEngine::new("1PG7OiApB1nwvP+rz05pAQ==");
        let ciphertext: [u8; 30] = [
            0xc0, 0x57, 0xf2, 0xf2, 0x94, 0x81, 0x60, 0xf6, 0xd7, 0xe7, 0xb6, 0xc5, 0x3e, 0x70,
            0xa2, 0xb8, 0x00, 0x9b, 0x75, 0x8e, 0xaf, 0xfd, 0xc1, 0x74, 0x9f, 0x0a, 0x1c, 0x72,
            0xd1, 0x6d,
        ];
        let expected: [u8; 30] = [
            0x08, 0x03, 0x12, 0x15, 0x0d, 0x00, 0x80, 0x02, 0x12, 0x15, 0x00, 0x80, 0xb6, 0xc5,
            0x18, 0xc4, 0x01, 0x25, 0xef, 0x49, 0xde, 0x66, 0xb8, 0x01, 0x10, 0x35, 0xd3, 0xd0,
            0x3c, 0x70,
        ];
        let plaintext = engine.decrypt(1129710788, 812977943, &ciphertext);
        assert_eq!(plaintext, expected);
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let engine = CryptoEngine::default();
        let plaintext = b"Test data for encryption and decryption cycle".to_vec();
        let ciphertext = engine.encrypt(1129710788, 812977943, &plaintext);
        let recovered = engine.decrypt(1129710788, 812977943, &ciphertext);
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn pki_channel_refuses_decryption() {
        let mut envelope = ServiceEnvelope {
            packet: Some(proto::MeshPacket {
                from: 1,
                to: proto::BROADCAST_ADDR,
                id: 1,
                encrypted: vec![1, 2, 3],
                ..Default::default()
            }),
            channel_id: "PKI".into(),
            gateway_id: "!deadbeef".into(),
        };
        let engine = CryptoEngine::default();
        assert!(decrypt(&mut envelope, &engine).is_err());
    }

    #[test]
    fn no_encrypted_bytes_is_a_no_op() {
        let mut envelope = ServiceEnvelope {
            packet: Some(proto::MeshPacket {
                from: 1,
                to: proto::BROADCAST_ADDR,
                id: 1,
                ..Default::default()
            }),
            channel_id: "LongFast".into(),
            gateway_id: "!deadbeef".into(),
        };
        let engine = CryptoEngine::default();
        assert_eq!(decrypt(&mut envelope, &engine).unwrap(), false);
    }
}
