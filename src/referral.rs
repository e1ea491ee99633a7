//! LDAP URL parsing (RFC 4516) and referral chasing.
//!
//! A referral response names one or more LDAP URLs the client may retry
//! the operation against. [`LdapUrl`] parses the URL into its components;
//! [`ReferralConnector`] is the pluggable policy for turning a parsed URL
//! into a fresh connection (plain reconnect, credential reuse, pooled
//! connections — all composable by implementing the trait); [`chase`]
//! drives the hop-counted retry loop shared by every operation that
//! supports referral chasing.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use percent_encoding::percent_decode_str;

use crate::conn::LdapConnAsync;
use crate::ldap::Ldap;
use crate::result::{LdapError, LdapResult, Result};
use crate::search::Scope;

/// Default referral hop limit (RFC 4511 doesn't mandate one; this
/// matches common directory server/client defaults).
pub const DEFAULT_REFERRAL_HOP_LIMIT: u32 = 5;

/// A parsed LDAP URL: `scheme://host[:port]/[dn[?attrs[?scope[?filter]]]]`.
/// Missing components take the RFC 4516 defaults: empty base DN, scope
/// `base`, filter `(objectClass=*)`, all user attributes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LdapUrl {
    pub tls: bool,
    pub host: String,
    pub port: u16,
    pub dn: String,
    pub attrs: Vec<String>,
    pub scope: UrlScope,
    pub filter: String,
}

/// [`Scope`] doesn't implement `PartialEq`/`Eq` needed here; this mirrors
/// it for URL comparison and is converted with [`UrlScope::to_scope`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UrlScope {
    Base,
    One,
    Sub,
}

impl UrlScope {
    pub fn to_scope(self) -> Scope {
        match self {
            UrlScope::Base => Scope::Base,
            UrlScope::One => Scope::OneLevel,
            UrlScope::Sub => Scope::Subtree,
        }
    }
}

impl fmt::Display for LdapUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}:{}/{}",
            if self.tls { "ldaps" } else { "ldap" },
            self.host,
            self.port,
            self.dn
        )
    }
}

impl LdapUrl {
    /// Parse an LDAP URL string. Only `ldap://`/`ldaps://` schemes are
    /// accepted; anything else is [`LdapError::UnimplementedScheme`].
    pub fn parse(s: &str) -> Result<LdapUrl> {
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| LdapError::Decoding(format!("not an LDAP URL: {s:?}")))?;
        let tls = match scheme {
            "ldap" => false,
            "ldaps" => true,
            other => return Err(LdapError::UnimplementedScheme(other.to_owned())),
        };
        let default_port = if tls { 636 } else { 389 };

        // hostport is up to the first '/', '?' never appears before a '/'
        // is present per the grammar, but tolerate a bare hostport with
        // no trailing slash at all.
        let (hostport, tail) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx + 1..]),
            None => (rest, ""),
        };
        let (host, port) = match hostport.rsplit_once(':') {
            Some((h, p)) if !h.is_empty() => {
                let port = p
                    .parse()
                    .map_err(|_| LdapError::Decoding(format!("bad port in LDAP URL: {s:?}")))?;
                (h.to_owned(), port)
            }
            _ => (hostport.to_owned(), default_port),
        };
        if host.is_empty() {
            return Err(LdapError::Decoding(format!("LDAP URL missing host: {s:?}")));
        }

        let mut fields = tail.split('?');
        let dn = percent_decode_str(fields.next().unwrap_or(""))
            .decode_utf8_lossy()
            .into_owned();
        let attrs: Vec<String> = match fields.next() {
            Some("") | None => Vec::new(),
            Some(a) => a
                .split(',')
                .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
                .collect(),
        };
        let scope = match fields.next() {
            Some("one") => UrlScope::One,
            Some("sub") => UrlScope::Sub,
            _ => UrlScope::Base,
        };
        let filter = match fields.next() {
            Some("") | None => "(objectClass=*)".to_owned(),
            Some(f) => percent_decode_str(f).decode_utf8_lossy().into_owned(),
        };

        Ok(LdapUrl { tls, host, port, dn, attrs, scope, filter })
    }

    fn connect_url(&self) -> String {
        format!("{}://{}:{}/", if self.tls { "ldaps" } else { "ldap" }, self.host, self.port)
    }
}

/// Pluggable policy for obtaining a connection to a referred-to server.
///
/// The default ([`DefaultReferralConnector`]) opens a fresh, unauthenticated
/// connection per RFC 4516's scheme. A caller wanting to reuse credentials,
/// draw from a connection pool, or apply its own TLS settings implements
/// this trait and installs it via [`Ldap::with_referral_chasing`](crate::Ldap::with_referral_chasing).
#[async_trait]
pub trait ReferralConnector: Send + Sync {
    async fn connect(&self, url: &LdapUrl) -> Result<(LdapConnAsync, Ldap)>;
}

/// Opens a plain, unauthenticated connection to the referral's host/port,
/// using the referral's own scheme (`ldap`/`ldaps`) for transport security.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultReferralConnector;

#[async_trait]
impl ReferralConnector for DefaultReferralConnector {
    async fn connect(&self, url: &LdapUrl) -> Result<(LdapConnAsync, Ldap)> {
        LdapConnAsync::new(&url.connect_url()).await
    }
}

type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Drive the hop-counted referral retry loop described in spec section
/// 4.4: for each URL in order, connect, reissue, and return the first
/// result whose connect-and-reissue both succeed. A reissued result that
/// is itself a referral is chased again, up to `hop_limit` total hops. If
/// every URL fails, or the hop limit is exceeded, the caller's original
/// referral result is preserved by returning `Ok(None)`; the caller then
/// reports that original result verbatim rather than the referral
/// chase's failure.
///
/// `reissue` receives the fresh `Ldap` handle (already driven) and the
/// parsed URL, and returns the `LdapResult` of retrying the original
/// operation on the new connection.
pub(crate) fn chase<'a, F, Fut>(
    urls: &'a [String],
    hop: u32,
    hop_limit: u32,
    connector: &'a dyn ReferralConnector,
    reissue: &'a mut F,
) -> BoxFuture<'a, Result<Option<LdapResult>>>
where
    F: FnMut(Ldap, &LdapUrl) -> Fut + Send,
    Fut: std::future::Future<Output = Result<LdapResult>> + Send + 'a,
{
    Box::pin(async move {
        if hop >= hop_limit {
            return Ok(None);
        }
        for raw_url in urls {
            let url = match LdapUrl::parse(raw_url) {
                Ok(u) => u,
                Err(_) => continue,
            };
            let (conn, ldap) = match connector.connect(&url).await {
                Ok(pair) => pair,
                Err(_) => continue,
            };
            crate::drive!(conn);
            match reissue(ldap, &url).await {
                Ok(result) if result.rc == 10 => {
                    match chase(&result.refs, hop + 1, hop_limit, connector, reissue).await {
                        Ok(Some(r)) => return Ok(Some(r)),
                        _ => continue,
                    }
                }
                Ok(result) => return Ok(Some(result)),
                Err(_) => continue,
            }
        }
        Ok(None)
    })
}

/// Shared, process-wide default connector, used when referral chasing is
/// enabled without an explicit [`ReferralConnector`].
pub(crate) fn default_connector() -> Arc<dyn ReferralConnector> {
    Arc::new(DefaultReferralConnector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_url() {
        let url = LdapUrl::parse("ldap://ds.example.com:1389/dc=example,dc=com?cn,mail?sub?(uid=jdoe)").unwrap();
        assert!(!url.tls);
        assert_eq!(url.host, "ds.example.com");
        assert_eq!(url.port, 1389);
        assert_eq!(url.dn, "dc=example,dc=com");
        assert_eq!(url.attrs, vec!["cn".to_owned(), "mail".to_owned()]);
        assert_eq!(url.scope, UrlScope::Sub);
        assert_eq!(url.filter, "(uid=jdoe)");
    }

    #[test]
    fn defaults_missing_components() {
        let url = LdapUrl::parse("ldap://ds.example.com").unwrap();
        assert_eq!(url.port, 389);
        assert_eq!(url.dn, "");
        assert!(url.attrs.is_empty());
        assert_eq!(url.scope, UrlScope::Base);
        assert_eq!(url.filter, "(objectClass=*)");
    }

    #[test]
    fn ldaps_defaults_to_636() {
        let url = LdapUrl::parse("ldaps://ds.example.com/dc=example,dc=com").unwrap();
        assert!(url.tls);
        assert_eq!(url.port, 636);
    }

    #[test]
    fn rejects_non_ldap_scheme() {
        assert!(matches!(
            LdapUrl::parse("http://ds.example.com/"),
            Err(LdapError::UnimplementedScheme(_))
        ));
    }
}
