use bytes::BytesMut;

use ber_codec::parse::parse_tag;
use ber_codec::structures::{ASNTag, Integer, OctetString, Sequence, Tag};
use ber_codec::write::write_tag_into;

use super::{ControlParser, Oid};
use crate::result::{LdapError, Result};

pub const PAGED_RESULTS_OID: &str = "1.2.840.113556.1.4.319";

/// Paged Results control ([RFC 2696](https://tools.ietf.org/html/rfc2696)).
///
/// Used both as a request control, to ask for up to `size` entries per
/// page, and as a response control, where the server returns its own
/// `size` estimate and a `cookie` the client echoes back to fetch the
/// next page. An empty `cookie` in the response marks the last page.
#[derive(Clone, Debug, Default)]
pub struct PagedResults {
    pub size: i32,
    pub cookie: Vec<u8>,
}

impl Oid for PagedResults {
    fn oid(&self) -> &'static str {
        PAGED_RESULTS_OID
    }

    fn value(&self) -> Option<Vec<u8>> {
        let val = Tag::Sequence(Sequence {
            inner: vec![
                Tag::Integer(Integer {
                    inner: self.size as i64,
                    ..Default::default()
                }),
                Tag::OctetString(OctetString {
                    inner: self.cookie.clone(),
                    ..Default::default()
                }),
            ],
            ..Default::default()
        })
        .into_structure();
        let mut buf = BytesMut::new();
        write_tag_into(&mut buf, &val);
        Some(buf.to_vec())
    }
}

impl ControlParser for PagedResults {
    fn parse(val: &[u8]) -> Result<PagedResults> {
        let (_, tag) = parse_tag(val)
            .map_err(|_| LdapError::Decoding("malformed Paged Results control value".into()))?;
        let mut tags = tag
            .expect_constructed()
            .ok_or_else(|| LdapError::Decoding("Paged Results control value is not a SEQUENCE".into()))?
            .into_iter();
        let size = tags
            .next()
            .and_then(|t| t.expect_primitive())
            .map(|b| Integer::from_struct_bytes(&b) as i32)
            .ok_or_else(|| LdapError::Decoding("Paged Results control missing size".into()))?;
        let cookie = tags
            .next()
            .and_then(|t| t.expect_primitive())
            .ok_or_else(|| LdapError::Decoding("Paged Results control missing cookie".into()))?;
        Ok(PagedResults { size, cookie })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_wire_bytes() {
        let pr = PagedResults { size: 50, cookie: vec![1, 2, 3] };
        let encoded = pr.value().unwrap();
        let decoded = PagedResults::parse(&encoded).unwrap();
        assert_eq!(decoded.size, 50);
        assert_eq!(decoded.cookie, vec![1, 2, 3]);
    }

    #[test]
    fn empty_cookie_marks_last_page() {
        let pr = PagedResults { size: 0, cookie: vec![] };
        let encoded = pr.value().unwrap();
        let decoded = PagedResults::parse(&encoded).unwrap();
        assert!(decoded.cookie.is_empty());
    }
}
