use super::{Control, RawControl};

pub const PROXY_AUTH_OID: &str = "2.16.840.1.113730.3.4.18";

/// Proxy Authorization control ([RFC 4370](https://tools.ietf.org/html/rfc4370)).
///
/// Asks the server to perform the request as `authzid` instead of the
/// bound identity. Always sent critical: a server that doesn't honor the
/// control must reject the request rather than silently ignore it, so
/// this control intentionally has no non-critical form.
#[derive(Clone, Debug)]
pub struct ProxyAuth {
    /// Authorization identity, empty if anonymous.
    pub authzid: String,
}

impl From<ProxyAuth> for Control {
    fn from(pa: ProxyAuth) -> Control {
        Control(
            None,
            RawControl {
                ctype: PROXY_AUTH_OID.to_owned(),
                crit: true,
                val: Some(pa.authzid.into_bytes()),
            },
        )
    }
}
