// SPDX-License-Identifier: MIT OR Apache-2.0
//! Identifier Codec (C2) — encodes opaque AAS identifiers to/from URL-safe
//! tokens for use as HTTP path segments.
//!
//! Identifiers are arbitrary strings (typically URIs). The wire form is
//! URL-safe base64 **without padding**: `+` → `-`, `/` → `_`, trailing `=`
//! dropped. Decoding accepts optional padding for leniency but always
//! rejects output exceeding the identifier size cap or non-UTF-8 bytes.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use titan_error::TitanError;

/// Maximum identifier length in bytes (spec §4.1, §8 boundary case).
pub const MAX_ID_BYTES: usize = 2048;

/// Encode an identifier into its URL-safe token form.
///
/// # Errors
///
/// Returns [`TitanError::validation`] if `id` is empty or exceeds
/// [`MAX_ID_BYTES`].
pub fn encode(id: &str) -> Result<String, TitanError> {
    validate_id(id)?;
    Ok(URL_SAFE_NO_PAD.encode(id.as_bytes()))
}

/// Decode a URL-safe token back into its original identifier.
///
/// Accepts tokens with or without trailing `=` padding. Rejects tokens that
/// decode to invalid UTF-8 or to an identifier over [`MAX_ID_BYTES`].
///
/// # Errors
///
/// Returns [`TitanError::validation`] if the token is not valid base64, does
/// not decode to UTF-8, or decodes to an identifier over the size cap.
pub fn decode(token: &str) -> Result<String, TitanError> {
    let trimmed = token.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(trimmed)
        .map_err(|e| TitanError::validation(format!("invalid identifier token: {e}")))?;
    let id = String::from_utf8(bytes)
        .map_err(|_| TitanError::validation("identifier token did not decode to UTF-8"))?;
    validate_id(&id)?;
    Ok(id)
}

fn validate_id(id: &str) -> Result<(), TitanError> {
    if id.is_empty() {
        return Err(TitanError::validation("identifier must not be empty"));
    }
    if id.len() > MAX_ID_BYTES {
        return Err(TitanError::validation(format!(
            "identifier exceeds maximum size of {MAX_ID_BYTES} bytes"
        )));
    }
    // The encoded form must only ever contain unreserved URL characters.
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn round_trips_a_typical_uri() {
        let id = "urn:ex:aas:1";
        let token = encode(id).unwrap();
        assert_eq!(decode(&token).unwrap(), id);
    }

    #[test]
    fn encoded_form_is_url_safe_charset_only() {
        let token = encode("urn:ex:aas:1?x=y/z+w").unwrap();
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn rejects_empty_identifier() {
        assert!(encode("").is_err());
    }

    #[test]
    fn rejects_identifier_over_size_cap() {
        let big = "a".repeat(MAX_ID_BYTES + 1);
        assert!(encode(&big).is_err());
    }

    #[test]
    fn accepts_identifier_at_size_cap() {
        let exact = "a".repeat(MAX_ID_BYTES);
        assert!(encode(&exact).is_ok());
    }

    #[test]
    fn decode_accepts_optional_padding() {
        let id = "urn:ex:aas:1";
        let token = encode(id).unwrap();
        let padded = format!("{token}{}", "=".repeat((4 - token.len() % 4) % 4));
        assert_eq!(decode(&padded).unwrap(), id);
    }

    #[test]
    fn decode_rejects_invalid_base64() {
        assert!(decode("not a valid token!!").is_err());
    }

    #[test]
    fn decode_rejects_non_utf8_bytes() {
        // 0xff, 0xfe is not valid UTF-8 in any decoding.
        let token = URL_SAFE_NO_PAD.encode([0xffu8, 0xfe]);
        assert!(decode(&token).is_err());
    }

    proptest! {
        #[test]
        fn decode_encode_law_holds_for_arbitrary_valid_ids(
            s in "[a-zA-Z0-9:/._-]{1,200}"
        ) {
            let token = encode(&s).unwrap();
            prop_assert!(token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
            prop_assert_eq!(decode(&token).unwrap(), s);
        }
    }
}
