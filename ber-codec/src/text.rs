//! Decoding OCTET STRING payloads as text.
//!
//! RFC 4511 mandates UTF-8 for every string-valued field, but field
//! implementations disagree on whether a stray trailing NUL is an error
//! or noise; [`DecodeOptions::lenient_text`] lets a caller opt into
//! tolerating it instead of hard-failing the whole response.

use std::str::Utf8Error;

/// Per-decode knobs that don't belong on the wire format itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct DecodeOptions {
    /// Strip a single trailing NUL byte before UTF-8 validation.
    pub lenient_text: bool,
}

/// Decode an OCTET STRING payload as UTF-8 text, honoring `opts`.
pub fn decode_text(bytes: &[u8], opts: DecodeOptions) -> Result<String, Utf8Error> {
    let trimmed = if opts.lenient_text && bytes.last() == Some(&0) {
        &bytes[..bytes.len() - 1]
    } else {
        bytes
    };
    std::str::from_utf8(trimmed).map(|s| s.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_rejects_trailing_nul_as_part_of_the_string() {
        let decoded = decode_text(b"cn=admin\0", DecodeOptions::default()).unwrap();
        assert_eq!(decoded, "cn=admin\0");
    }

    #[test]
    fn lenient_strips_trailing_nul() {
        let opts = DecodeOptions { lenient_text: true };
        let decoded = decode_text(b"cn=admin\0", opts).unwrap();
        assert_eq!(decoded, "cn=admin");
    }
}
