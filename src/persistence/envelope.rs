//! Versioned, checksummed save envelope
//!
//! Wire form: `{"checksum": i32, "data": {"version": .., "timestamp": .., ...}}`.
//! Payloads without the wrapper are legacy saves and are read as `data`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::EnvelopeError;
use super::registry::{RESERVED_NAMES, Snapshot};

/// The save payload: core fields plus one entry per subsystem
pub type Payload = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub checksum: i32,
    pub data: Payload,
}

impl Envelope {
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn version(&self) -> Option<u64> {
        self.data.get("version").and_then(Value::as_u64)
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.data.get("timestamp").and_then(Value::as_i64)
    }
}

/// 32-bit rolling hash (`h = h * 31 + unit`) over UTF-16 code units.
///
/// Detects accidental corruption only; trivially forgeable.
pub fn checksum(text: &str) -> i32 {
    text.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit))
    })
}

/// Checksum of a payload's canonical string form
pub fn payload_checksum(data: &Payload) -> Result<i32, serde_json::Error> {
    Ok(checksum(&serde_json::to_string(data)?))
}

/// Build an envelope: `version`, `timestamp`, core fields, then subsystem
/// snapshots in the order given. Later keys overwrite earlier ones, except
/// that core fields named `version` or `timestamp` are dropped.
pub fn wrap(
    version: u32,
    timestamp: i64,
    core_fields: &Payload,
    snapshots: impl IntoIterator<Item = (String, Snapshot)>,
) -> Result<Envelope, serde_json::Error> {
    let mut data = Payload::new();
    data.insert("version".to_string(), Value::from(version));
    data.insert("timestamp".to_string(), Value::from(timestamp));
    for (key, value) in core_fields {
        if RESERVED_NAMES.contains(&key.as_str()) {
            log::warn!("Ignoring core field {key:?}: name is reserved");
            continue;
        }
        data.insert(key.clone(), value.clone());
    }
    for (name, snapshot) in snapshots {
        data.insert(name, snapshot);
    }

    let checksum = payload_checksum(&data)?;
    Ok(Envelope { checksum, data })
}

/// An opened envelope
#[derive(Debug, Clone, PartialEq)]
pub struct Unwrapped {
    pub data: Payload,
    /// Stored checksum did not match the payload
    pub corrupted: bool,
    /// Pre-envelope save without a checksum
    pub legacy: bool,
}

/// Parse a stored string and verify its checksum.
///
/// A mismatch is reported through `corrupted`, never as an error; the data is
/// still returned so a migrated or hand-edited save does not strand the player.
pub fn unwrap(raw: &str) -> Result<Unwrapped, EnvelopeError> {
    let Value::Object(mut root) = serde_json::from_str::<Value>(raw)? else {
        return Err(EnvelopeError::NotAnObject);
    };

    if !(root.contains_key("checksum") && root.contains_key("data")) {
        return Ok(Unwrapped {
            data: root,
            corrupted: false,
            legacy: true,
        });
    }

    let stored = root.get("checksum").and_then(Value::as_i64);
    let Some(Value::Object(data)) = root.remove("data") else {
        return Err(EnvelopeError::DataNotAnObject);
    };
    let computed = payload_checksum(&data)?;
    Ok(Unwrapped {
        data,
        corrupted: stored != Some(i64::from(computed)),
        legacy: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn core(value: Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_checksum_matches_reference_values() {
        assert_eq!(checksum(""), 0);
        assert_eq!(checksum("a"), 97);
        assert_eq!(checksum("ab"), 97 * 31 + 98);
        // Wraps like 32-bit integer math
        assert_eq!(checksum("hello world"), 1_794_106_052);
        // UTF-16 code units, so astral characters count twice
        assert_eq!(checksum("😀"), 0xD83D * 31 + 0xDE00);
    }

    #[test]
    fn test_wrap_orders_fields() {
        let envelope = wrap(
            3,
            1_700_000_000_000,
            &core(json!({"gold": 5})),
            vec![("mining".to_string(), json!({"level": 2}))],
        )
        .unwrap();

        let keys: Vec<_> = envelope.data.keys().map(String::as_str).collect();
        assert_eq!(keys, ["version", "timestamp", "gold", "mining"]);
        assert_eq!(envelope.version(), Some(3));
        assert_eq!(envelope.timestamp(), Some(1_700_000_000_000));

        let text = envelope.to_json_string().unwrap();
        assert!(text.starts_with("{\"checksum\":"));
        assert!(text.contains("\"data\":{\"version\":3,\"timestamp\":1700000000000,\"gold\":5"));
    }

    #[test]
    fn test_core_fields_cannot_override_envelope_fields() {
        let fields = core(json!({"gold": 5, "version": "1.4.2", "timestamp": "yesterday"}));
        let envelope = wrap(2, 42, &fields, vec![]).unwrap();
        assert_eq!(envelope.version(), Some(2));
        assert_eq!(envelope.timestamp(), Some(42));
        assert_eq!(envelope.data["gold"], json!(5));
        assert_eq!(envelope.data.len(), 3);
    }

    #[test]
    fn test_wrap_then_unwrap_is_clean() {
        let fields = core(json!({"gold": 5, "name": "Ünïcødé ⛏"}));
        let envelope = wrap(1, 42, &fields, vec![]).unwrap();
        let opened = unwrap(&envelope.to_json_string().unwrap()).unwrap();
        assert!(!opened.corrupted);
        assert!(!opened.legacy);
        assert_eq!(opened.data, envelope.data);
    }

    #[test]
    fn test_single_character_change_is_detected() {
        let envelope = wrap(1, 42, &core(json!({"gold": 5})), vec![]).unwrap();
        let text = envelope.to_json_string().unwrap();
        let tampered = text.replace("\"gold\":5", "\"gold\":6");
        assert_ne!(tampered, text);

        let opened = unwrap(&tampered).unwrap();
        assert!(opened.corrupted);
        assert_eq!(opened.data["gold"], json!(6));
    }

    #[test]
    fn test_bad_checksum_value_is_corrupted() {
        let opened = unwrap(r#"{"checksum":"nope","data":{"gold":1}}"#).unwrap();
        assert!(opened.corrupted);
    }

    #[test]
    fn test_legacy_payload_is_data() {
        let opened = unwrap(r#"{"gold":5,"version":0}"#).unwrap();
        assert!(opened.legacy);
        assert!(!opened.corrupted);
        assert_eq!(opened.data["gold"], json!(5));

        // Only one of the two wrapper keys: still legacy
        let opened = unwrap(r#"{"data":{"gold":5}}"#).unwrap();
        assert!(opened.legacy);
    }

    #[test]
    fn test_unwrap_errors() {
        assert!(matches!(unwrap("{not json"), Err(EnvelopeError::Json(_))));
        assert!(matches!(unwrap("[1,2]"), Err(EnvelopeError::NotAnObject)));
        assert!(matches!(
            unwrap(r#"{"checksum":1,"data":[1]}"#),
            Err(EnvelopeError::DataNotAnObject)
        ));
        assert!(matches!(unwrap(""), Err(EnvelopeError::Json(_))));
    }
}
