use std::collections::HashMap;

use bytes::BytesMut;

use ber_codec::parse::parse_tag;
use ber_codec::structures::{ASNTag, OctetString, Sequence, Tag};
use ber_codec::write::write_tag_into;

use super::{ControlParser, Oid};
use crate::result::{LdapError, Result};
use crate::search::{ResultEntry, SearchEntry};

pub const PRE_READ_OID: &str = "1.3.6.1.1.13.1";
pub const POST_READ_OID: &str = "1.3.6.1.1.13.2";

#[derive(Clone, Debug)]
struct ReadEntry<S> {
    attrs: Vec<S>,
    oid: &'static str,
}

impl<S: AsRef<str>> ReadEntry<S> {
    fn value(&self) -> Option<Vec<u8>> {
        let attr_vec = self
            .attrs
            .iter()
            .map(|a| {
                Tag::OctetString(OctetString {
                    inner: Vec::from(a.as_ref()),
                    ..Default::default()
                })
            })
            .collect();
        let cval = Tag::Sequence(Sequence {
            inner: attr_vec,
            ..Default::default()
        })
        .into_structure();
        let mut buf = BytesMut::new();
        write_tag_into(&mut buf, &cval);
        Some(buf.to_vec())
    }
}

/// Response for Pre-Read and Post-Read controls.
///
/// The structure is the same for both cases, but type aliases are
/// provided for uniformity with the request-control names.
#[derive(Clone, Debug, Default)]
pub struct ReadEntryResp {
    /// Attributes.
    pub attrs: HashMap<String, Vec<String>>,
    /// Binary-valued attributes.
    pub bin_attrs: HashMap<String, Vec<Vec<u8>>>,
}

/// Type alias for Pre-Read response.
pub type PreReadResp = ReadEntryResp;

/// Type alias for Post-Read response.
pub type PostReadResp = ReadEntryResp;

/// Pre-Read request control ([RFC 4527](https://tools.ietf.org/html/rfc4527)):
/// returns the target entry as it was immediately before the operation.
#[derive(Clone, Debug)]
pub struct PreRead<S>(ReadEntry<S>);

impl<S: AsRef<str>> PreRead<S> {
    /// Create a new control instance with the specified list of attribute
    /// names/OIDs.
    pub fn new(attrs: Vec<S>) -> PreRead<S> {
        PreRead(ReadEntry {
            attrs,
            oid: PRE_READ_OID,
        })
    }
}

impl<S: AsRef<str>> Oid for PreRead<S> {
    fn oid(&self) -> &'static str {
        self.0.oid
    }

    fn value(&self) -> Option<Vec<u8>> {
        self.0.value()
    }
}

/// Post-Read request control ([RFC 4527](https://tools.ietf.org/html/rfc4527)):
/// returns the target entry as it is immediately after the operation.
#[derive(Clone, Debug)]
pub struct PostRead<S>(ReadEntry<S>);

impl<S: AsRef<str>> PostRead<S> {
    /// Create a new control instance with the specified list of attribute
    /// names/OIDs.
    pub fn new(attrs: Vec<S>) -> PostRead<S> {
        PostRead(ReadEntry {
            attrs,
            oid: POST_READ_OID,
        })
    }
}

impl<S: AsRef<str>> Oid for PostRead<S> {
    fn oid(&self) -> &'static str {
        self.0.oid
    }

    fn value(&self) -> Option<Vec<u8>> {
        self.0.value()
    }
}

impl ControlParser for ReadEntryResp {
    fn parse(val: &[u8]) -> Result<ReadEntryResp> {
        let (_, tag) = parse_tag(val)
            .map_err(|_| LdapError::Decoding("malformed (Pre|Post)Read control value".into()))?;
        let se = SearchEntry::construct(ResultEntry::new(tag, Vec::new()));
        Ok(ReadEntryResp {
            attrs: se.attrs,
            bin_attrs: se.bin_attrs,
        })
    }
}
