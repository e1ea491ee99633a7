use super::Oid;

pub const MANAGE_DSA_IT_OID: &str = "2.16.840.1.113730.3.4.2";

/// ManageDsaIT control ([RFC 3296](https://tools.ietf.org/html/rfc3296)).
///
/// Tells the server to operate on a referral or alias entry itself rather
/// than chasing it. Request-only; there's no corresponding response control.
#[derive(Clone, Copy, Debug, Default)]
pub struct ManageDsaIt;

impl Oid for ManageDsaIt {
    fn oid(&self) -> &'static str {
        MANAGE_DSA_IT_OID
    }

    fn value(&self) -> Option<Vec<u8>> {
        None
    }
}
