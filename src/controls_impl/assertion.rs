use bytes::BytesMut;

use ber_codec::structures::ASNTag;
use ber_codec::write::write_tag_into;

use super::Oid;
use crate::filter::parse;
use crate::result::Result;

pub const ASSERTION_OID: &str = "1.3.6.1.1.12";

/// Assertion control ([RFC 4528](https://tools.ietf.org/html/rfc4528)).
///
/// Attaches a filter to a request; the server only carries out the
/// operation if the filter matches the target entry.
#[derive(Clone, Debug)]
pub struct Assertion<S> {
    /// String representation of the assertion filter.
    pub filter: S,
}

impl<S: AsRef<str>> Assertion<S> {
    /// Create a new control instance with the specified filter. Returns an
    /// error if the filter string doesn't parse.
    pub fn new(filter: S) -> Result<Assertion<S>> {
        // validate eagerly so a bad filter fails at construction, not at
        // the point the control is attached to a request
        parse(filter.as_ref())?;
        Ok(Assertion { filter })
    }
}

impl<S: AsRef<str>> Oid for Assertion<S> {
    fn oid(&self) -> &'static str {
        ASSERTION_OID
    }

    fn value(&self) -> Option<Vec<u8>> {
        let filter_tag = parse(self.filter.as_ref()).ok()?.into_structure();
        let mut buf = BytesMut::new();
        write_tag_into(&mut buf, &filter_tag);
        Some(buf.to_vec())
    }
}
