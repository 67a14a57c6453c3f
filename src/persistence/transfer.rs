//! Clipboard-safe save export and hardened import
//!
//! Export text is `base64(encodeURIComponent(json))`: plain ASCII that
//! survives chat clients and text fields. Import reverses both layers, then
//! strips prototype-pollution keys at every depth before anything is stored.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;

use super::error::{ExportError, ImportError};
use crate::platform::KeyValueStore;

/// Keys that would reach `Object.prototype` in a JavaScript consumer
pub const FORBIDDEN_KEYS: [&str; 3] = ["__proto__", "constructor", "prototype"];

/// Result of a successful import
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    /// Dangerous keys removed during sanitization
    pub stripped_keys: usize,
    /// Size of the stored JSON
    pub bytes: usize,
}

/// Characters `encodeURIComponent` leaves as-is
fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(byte, b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'\'' | b'(' | b')')
}

/// Percent-escape UTF-8 bytes the way `encodeURIComponent` does
pub fn encode_uri_component(text: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(text.len() * 3);
    for byte in text.bytes() {
        if is_unreserved(byte) {
            out.push(byte as char);
        } else {
            out.push('%');
            out.push(HEX[(byte >> 4) as usize] as char);
            out.push(HEX[(byte & 0x0f) as usize] as char);
        }
    }
    out
}

/// Inverse of [`encode_uri_component`]; rejects truncated escapes and
/// sequences that do not decode to UTF-8
pub fn decode_uri_component(text: &str) -> Result<String, ImportError> {
    fn hex(byte: u8) -> Option<u8> {
        match byte {
            b'0'..=b'9' => Some(byte - b'0'),
            b'a'..=b'f' => Some(byte - b'a' + 10),
            b'A'..=b'F' => Some(byte - b'A' + 10),
            _ => None,
        }
    }

    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let high = bytes.get(i + 1).copied().and_then(hex);
            let low = bytes.get(i + 2).copied().and_then(hex);
            match (high, low) {
                (Some(high), Some(low)) => out.push(high << 4 | low),
                _ => return Err(ImportError::Escape(format!("malformed escape at byte {i}"))),
            }
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|err| ImportError::Escape(err.to_string()))
}

/// Encode a stored save string for export
pub fn encode_export(raw: &str) -> String {
    STANDARD.encode(encode_uri_component(raw))
}

fn is_base64_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=')
}

/// Remove forbidden keys from every object in the tree, returning how many
/// were removed
pub fn sanitize(value: &mut Value) -> usize {
    match value {
        Value::Object(map) => {
            let before = map.len();
            map.retain(|key, _| !FORBIDDEN_KEYS.contains(&key.as_str()));
            let mut stripped = before - map.len();
            for child in map.values_mut() {
                stripped += sanitize(child);
            }
            stripped
        }
        Value::Array(items) => items.iter_mut().map(sanitize).sum(),
        _ => 0,
    }
}

/// Decode export text into a sanitized JSON object.
///
/// The character set is checked before decoding, so obviously foreign text
/// fails fast with the offending position.
pub fn decode_import(text: &str) -> Result<(Value, usize), ImportError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ImportError::Empty);
    }
    if let Some((position, found)) = text.char_indices().find(|&(_, c)| !is_base64_char(c)) {
        return Err(ImportError::InvalidCharacters { position, found });
    }

    let escaped = STANDARD.decode(text)?;
    let escaped = String::from_utf8(escaped)
        .map_err(|_| ImportError::Escape("decoded text is not ASCII".to_string()))?;
    let json = decode_uri_component(&escaped)?;

    let mut value: Value = serde_json::from_str(&json)?;
    if !value.is_object() {
        return Err(ImportError::NotAnObject);
    }
    let stripped = sanitize(&mut value);
    if stripped > 0 {
        log::warn!("Stripped {stripped} forbidden key(s) from imported save");
    }
    Ok((value, stripped))
}

/// Read the primary save and encode it for export
pub fn export_save<S: KeyValueStore + ?Sized>(store: &S, key: &str) -> Result<String, ExportError> {
    match store.get(key)? {
        Some(raw) if !raw.is_empty() => Ok(encode_export(&raw)),
        _ => Err(ExportError::NoSave),
    }
}

/// Validate, decode and sanitize `text`, then store it as the primary save.
///
/// Live state is not touched; load afterwards to apply the import. On any
/// error the stored save is left as it was.
pub fn import_save<S: KeyValueStore + ?Sized>(
    store: &mut S,
    key: &str,
    text: &str,
) -> Result<ImportReport, ImportError> {
    let (value, stripped_keys) = decode_import(text)?;
    let json = serde_json::to_string(&value)?;
    store.set(key, &json)?;
    log::info!("Imported save ({} bytes)", json.len());
    Ok(ImportReport {
        stripped_keys,
        bytes: json.len(),
    })
}
