//! Conversions between the encodings the node uses for payment hashes and
//! preimages. The domain model always carries them as lowercase hex, while
//! the REST surface hands out base64 for most byte fields.

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE},
    Engine as _,
};

use crate::error::CoreError;

/// Length in bytes of payment hashes and preimages.
pub const HASH_LEN: usize = 32;

/// Decodes a base64 value (standard or url-safe alphabet) into lowercase hex.
pub fn base64_to_hex(value: &str) -> Result<String, CoreError> {
    let bytes = STANDARD
        .decode(value)
        .or_else(|err| URL_SAFE.decode(value).map_err(|_| err))?;
    Ok(hex::encode(bytes))
}

/// Like [`base64_to_hex`], but passes values that already are 32-byte hex
/// through (lowercased).
pub fn hash_to_hex(value: &str) -> Result<String, CoreError> {
    if is_hex_hash(value) {
        return Ok(value.to_ascii_lowercase());
    }
    base64_to_hex(value)
}

/// Brings a hash or preimage reported by the node into hex form.
///
/// 64 character hex strings are lowercased, base64 strings that decode to
/// exactly 32 bytes are converted to hex. Anything else is returned verbatim.
pub fn normalize_hash(value: &str) -> String {
    if is_hex_hash(value) {
        return value.to_ascii_lowercase();
    }

    match STANDARD.decode(value).or_else(|_| URL_SAFE.decode(value)) {
        Ok(bytes) if bytes.len() == HASH_LEN => hex::encode(bytes),
        _ => value.to_owned(),
    }
}

fn is_hex_hash(value: &str) -> bool {
    value.len() == HASH_LEN * 2 && value.chars().all(|c| c.is_ascii_hexdigit())
}
