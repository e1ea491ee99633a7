//! Distinguished Name parsing and comparison (RFC 4514).
//!
//! Most of the crate treats DNs as opaque strings — that's all the wire
//! protocol needs, and it's how [`Ldap`](crate::Ldap)'s operation methods
//! accept them (`&str`/`AsRef<str>`). [`Dn`] exists for the minority of
//! call sites that need RDN decomposition or name equality: comparing a
//! referral's rewritten base against the original, or validating a
//! Modify DN request's new RDN.

use std::fmt;

use crate::result::{LdapError, Result};

/// One `attributeType=value` pair inside an RDN.
#[derive(Clone, Debug)]
pub struct Ava {
    pub attr_type: String,
    pub value: String,
}

/// A Relative Distinguished Name: an unordered set of
/// `attributeType=value` pairs (a multi-valued RDN, e.g. `cn=Bob+uid=bob`,
/// has more than one).
#[derive(Clone, Debug, Default)]
pub struct Rdn(pub Vec<Ava>);

impl Rdn {
    /// True if `self` and `other` contain the same AVAs, comparing
    /// attribute types case-insensitively and values after RFC 4514
    /// string normalization, irrespective of AVA order.
    pub fn eq_normalized(&self, other: &Rdn) -> bool {
        if self.0.len() != other.0.len() {
            return false;
        }
        self.0.iter().all(|ava| {
            other
                .0
                .iter()
                .any(|o| ava.attr_type.eq_ignore_ascii_case(&o.attr_type) && normalize_value(&ava.value) == normalize_value(&o.value))
        })
    }
}

impl fmt::Display for Rdn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|ava| format!("{}={}", ava.attr_type, escape_value(&ava.value)))
            .collect();
        write!(f, "{}", parts.join("+"))
    }
}

/// A parsed Distinguished Name: an ordered list of RDNs, outermost
/// (leftmost) first, plus the original string it was parsed from.
#[derive(Clone, Debug)]
pub struct Dn {
    pub rdns: Vec<Rdn>,
    original: String,
}

impl Dn {
    /// Parse a DN per RFC 4514's string representation grammar:
    /// comma/plus-separated AVAs, `\`-escaped special characters, and
    /// `#`-prefixed hex-pair (BER) values.
    pub fn parse(s: &str) -> Result<Dn> {
        let original = s.to_owned();
        if s.is_empty() {
            return Ok(Dn { rdns: Vec::new(), original });
        }
        let mut rdns = Vec::new();
        for rdn_str in split_unescaped(s, ',') {
            let mut avas = Vec::new();
            for ava_str in split_unescaped(&rdn_str, '+') {
                avas.push(parse_ava(&ava_str)?);
            }
            if avas.is_empty() {
                return Err(LdapError::Decoding(format!("empty RDN in DN: {s:?}")));
            }
            rdns.push(Rdn(avas));
        }
        Ok(Dn { rdns, original })
    }

    /// The original string this `Dn` was parsed from (or built from, for
    /// [`Dn::empty`]).
    pub fn as_str(&self) -> &str {
        &self.original
    }

    /// The root DSE's DN: the empty string, zero RDNs.
    pub fn empty() -> Dn {
        Dn { rdns: Vec::new(), original: String::new() }
    }

    /// True if this is the zero-RDN root DSE DN.
    pub fn is_empty(&self) -> bool {
        self.rdns.is_empty()
    }

    /// RFC 4514-normalized equality: same number of RDNs, each pairwise
    /// equal per [`Rdn::eq_normalized`], in the same order. Attribute
    /// syntax-aware normalization (e.g. numeric OID canonicalization) is
    /// out of scope; this is string-level comparison only.
    pub fn eq_normalized(&self, other: &Dn) -> bool {
        self.rdns.len() == other.rdns.len()
            && self.rdns.iter().zip(other.rdns.iter()).all(|(a, b)| a.eq_normalized(b))
    }
}

impl fmt::Display for Dn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

fn parse_ava(s: &str) -> Result<Ava> {
    let eq = find_unescaped(s, '=')
        .ok_or_else(|| LdapError::Decoding(format!("AVA missing '=': {s:?}")))?;
    let attr_type = s[..eq].trim().to_owned();
    if attr_type.is_empty() {
        return Err(LdapError::Decoding(format!("empty attribute type in AVA: {s:?}")));
    }
    let raw_value = &s[eq + 1..];
    let value = if let Some(hex) = raw_value.strip_prefix('#') {
        decode_hex_value(hex)?
    } else {
        unescape_value(raw_value)?
    };
    Ok(Ava { attr_type, value })
}

/// Split on `sep`, honoring backslash escapes and `"..."`/`#hex` runs so
/// a literal comma or plus inside an escaped or quoted value doesn't
/// split the string.
fn split_unescaped(s: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut cur = String::new();
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            cur.push(c);
            if let Some(n) = chars.next() {
                cur.push(n);
            }
        } else if c == sep {
            parts.push(std::mem::take(&mut cur));
        } else {
            cur.push(c);
        }
    }
    parts.push(cur);
    parts
}

fn find_unescaped(s: &str, target: char) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if s[i..].starts_with(target) {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn unescape_value(s: &str) -> Result<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.trim().chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            let a = chars.next().ok_or_else(|| LdapError::Decoding("dangling escape in DN value".into()))?;
            if a.is_ascii_hexdigit() {
                let b = chars
                    .next()
                    .filter(|b| b.is_ascii_hexdigit())
                    .ok_or_else(|| LdapError::Decoding("incomplete hex escape in DN value".into()))?;
                let byte = u8::from_str_radix(&format!("{a}{b}"), 16)
                    .map_err(|e| LdapError::Decoding(format!("bad hex escape in DN value: {e}")))?;
                out.push(byte as char);
            } else {
                out.push(a);
            }
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

fn decode_hex_value(hex: &str) -> Result<String> {
    if hex.len() % 2 != 0 {
        return Err(LdapError::Decoding(format!("odd-length hex DN value: {hex:?}")));
    }
    let mut bytes = Vec::with_capacity(hex.len() / 2);
    let hb = hex.as_bytes();
    for chunk in hb.chunks(2) {
        let s = std::str::from_utf8(chunk).unwrap_or("");
        let byte = u8::from_str_radix(s, 16)
            .map_err(|e| LdapError::Decoding(format!("bad hex DN value: {e}")))?;
        bytes.push(byte);
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Normalize a decoded value for comparison: collapse runs of internal
/// whitespace to a single space and trim the ends, per RFC 4514 section
/// 2.2's case-ignoring string comparison rules used by this crate (full
/// attribute-syntax-aware normalization is out of scope).
fn normalize_value(v: &str) -> String {
    let collapsed: String = v.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.to_lowercase()
}

fn escape_value(v: &str) -> String {
    let mut out = String::with_capacity(v.len());
    for (i, c) in v.chars().enumerate() {
        let needs_escape = matches!(c, ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=')
            || (i == 0 && (c == ' ' || c == '#'))
            || (i == v.chars().count() - 1 && c == ' ');
        if needs_escape {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_dn() {
        let dn = Dn::parse("cn=admin,dc=example,dc=com").unwrap();
        assert_eq!(dn.rdns.len(), 3);
        assert_eq!(dn.rdns[0].0[0].attr_type, "cn");
        assert_eq!(dn.rdns[0].0[0].value, "admin");
    }

    #[test]
    fn parses_multivalued_rdn() {
        let dn = Dn::parse("cn=Bob+uid=bob,dc=example,dc=com").unwrap();
        assert_eq!(dn.rdns[0].0.len(), 2);
        assert_eq!(dn.rdns[0].0[1].attr_type, "uid");
    }

    #[test]
    fn unescapes_comma_in_value() {
        let dn = Dn::parse(r"cn=Smith\, John,dc=example,dc=com").unwrap();
        assert_eq!(dn.rdns[0].0[0].value, "Smith, John");
    }

    #[test]
    fn decodes_hex_pair_value() {
        let dn = Dn::parse("cn=#4A6F686E,dc=example,dc=com").unwrap();
        assert_eq!(dn.rdns[0].0[0].value, "John");
    }

    #[test]
    fn empty_dn_has_no_rdns() {
        let dn = Dn::parse("").unwrap();
        assert!(dn.is_empty());
    }

    #[test]
    fn equality_is_case_insensitive_on_attribute_type() {
        let a = Dn::parse("CN=admin,DC=example,DC=com").unwrap();
        let b = Dn::parse("cn=admin,dc=example,dc=com").unwrap();
        assert!(a.eq_normalized(&b));
    }

    #[test]
    fn equality_collapses_whitespace_in_value() {
        let a = Dn::parse("cn=Bob  Smith,dc=example,dc=com").unwrap();
        let b = Dn::parse("cn=Bob Smith,dc=example,dc=com").unwrap();
        assert!(a.eq_normalized(&b));
    }

    #[test]
    fn missing_equals_is_an_error() {
        assert!(Dn::parse("notanava,dc=example,dc=com").is_err());
    }
}
