use bytes::BytesMut;

use ber_codec::structures::ASNTag;
use ber_codec::write::write_tag_into;

use super::Oid;
use crate::filter::parse_matched_values;
use crate::result::Result;

pub const MATCHED_VALUES_OID: &str = "1.2.826.0.1.3344810.2.3";

/// Matched Values control ([RFC 3876](https://tools.ietf.org/html/rfc3876)).
///
/// Restricts which attribute values a Search response entry includes, to
/// those matching `filter`.
#[derive(Clone, Debug)]
pub struct MatchedValues<S> {
    filter: S,
}

impl<S: AsRef<str>> MatchedValues<S> {
    /// Create a new control instance with the specified filter.
    pub fn new(filter: S) -> Result<MatchedValues<S>> {
        parse_matched_values(filter.as_ref())?;
        Ok(MatchedValues { filter })
    }
}

impl<S: AsRef<str>> Oid for MatchedValues<S> {
    fn oid(&self) -> &'static str {
        MATCHED_VALUES_OID
    }

    fn value(&self) -> Option<Vec<u8>> {
        let filter_tag = parse_matched_values(self.filter.as_ref()).ok()?.into_structure();
        let mut buf = BytesMut::new();
        write_tag_into(&mut buf, &filter_tag);
        Some(buf.to_vec())
    }
}
