//! Inline file contents as RFC 2397 `data:` URLs.
//!
//! Encoding always produces the plain form `data:,<percent-escaped bytes>`.
//! Decoding also accepts a media type and the `;base64` flag, since
//! documents written by other tools use both.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use mcserver_shared::{MachineConfigServerError, Result};

const SCHEME: &str = "data:";

/// Encode arbitrary bytes as an inline `data:` URL.
pub fn encode(data: &[u8]) -> String {
    format!("{SCHEME},{}", urlencoding::encode_binary(data))
}

/// Decode a `data:` URL back into the bytes it carries.
pub fn decode(source: &str) -> Result<Vec<u8>> {
    let rest = source
        .get(..SCHEME.len())
        .filter(|scheme| scheme.eq_ignore_ascii_case(SCHEME))
        .map(|_| &source[SCHEME.len()..])
        .ok_or_else(|| MachineConfigServerError::malformed_content("missing data: scheme"))?;

    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| MachineConfigServerError::malformed_content("missing ',' separator"))?;

    let is_base64 = header
        .split(';')
        .skip(1)
        .last()
        .is_some_and(|param| param.eq_ignore_ascii_case("base64"));

    check_escapes(payload)?;
    let bytes = urlencoding::decode_binary(payload.as_bytes()).into_owned();

    if is_base64 {
        STANDARD
            .decode(&bytes)
            .map_err(|e| MachineConfigServerError::malformed_content(format!("invalid base64: {e}")))
    } else {
        Ok(bytes)
    }
}

/// Reject `%` sequences that are not followed by two hex digits.
fn check_escapes(payload: &str) -> Result<()> {
    let bytes = payload.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                return Err(MachineConfigServerError::malformed_content(format!(
                    "invalid percent escape at offset {i}"
                )));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    Ok(())
}
