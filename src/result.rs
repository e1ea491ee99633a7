//! Operation result structures and error handling.
//!
//! Most LDAP operations return an [`LdapResult`]. This module contains its
//! definition, the wrapper structs wrapping it for operations with
//! nonstandard outcomes, and [`LdapError`], the error type returned by
//! every fallible method in the crate.

use std::io;

use ber_codec::structure::StructureTag;
use ber_codec::structures::{ASNTag, Tag};
use ber_codec::universal::Types;

use thiserror::Error;

use crate::controls::Control;
use crate::exop::Exop;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, LdapError>;

/// The error type returned by this crate.
///
/// Variants roughly follow the taxonomy of things that can go wrong between
/// issuing a request and getting a usable `LdapResult` back: URL/address
/// resolution, transport I/O, protocol framing, and the server reporting a
/// non-success result code that the caller asked to be treated as an error
/// (via [`LdapResult::success`]).
#[derive(Debug, Error)]
pub enum LdapError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("URL parsing error: {0}")]
    UrlParsing(#[from] url::ParseError),

    #[error("unimplemented LDAP URL scheme: {0}")]
    UnimplementedScheme(String),

    #[error("empty Unix domain socket path")]
    EmptyUnixPath,

    #[error("decoding error: {0}")]
    Decoding(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("connection closed by the server")]
    ConnectionClosed,

    #[error("operation timed out")]
    Timeout,

    #[error("no addresses found for: {0}")]
    NoAddresses(String),

    #[error("adapter initialization error: {0}")]
    AdapterInit(String),

    #[error("filter parsing error: {0}")]
    FilterParsing(String),

    #[error("too many referral hops ({0})")]
    TooManyReferrals(u32),

    #[error("referral chasing error: {0}")]
    ReferralChasing(String),

    #[error("SASL error: {0}")]
    Sasl(String),

    #[error("result code {code}, dn: \"{matched}\", text: \"{text}\"")]
    LdapResult {
        code: u32,
        matched: String,
        text: String,
    },
}

impl LdapError {
    /// Translate an `LdapResult` into an error, preserving its components.
    pub(crate) fn from_result(res: &LdapResult) -> LdapError {
        LdapError::LdapResult {
            code: res.rc,
            matched: res.matched.clone(),
            text: res.text.clone(),
        }
    }
}

/// Return the textual name of an RFC 4511 Appendix A.1 result code, or
/// `"unknown"` for anything the standard doesn't define (including vendor
/// extensions this crate doesn't separately track).
pub fn result_text(rc: u32) -> &'static str {
    match rc {
        0 => "success",
        1 => "operationsError",
        2 => "protocolError",
        3 => "timeLimitExceeded",
        4 => "sizeLimitExceeded",
        5 => "compareFalse",
        6 => "compareTrue",
        7 => "authMethodNotSupported",
        8 => "strongerAuthRequired",
        10 => "referral",
        11 => "adminLimitExceeded",
        12 => "unavailableCriticalExtension",
        13 => "confidentialityRequired",
        14 => "saslBindInProgress",
        16 => "noSuchAttribute",
        17 => "undefinedAttributeType",
        18 => "inappropriateMatching",
        19 => "constraintViolation",
        20 => "attributeOrValueExists",
        21 => "invalidAttributeSyntax",
        32 => "noSuchObject",
        33 => "aliasProblem",
        34 => "invalidDNSyntax",
        36 => "aliasDereferencingProblem",
        48 => "inappropriateAuthentication",
        49 => "invalidCredentials",
        50 => "insufficientAccessRights",
        51 => "busy",
        52 => "unavailable",
        53 => "unwillingToPerform",
        54 => "loopDetect",
        64 => "namingViolation",
        65 => "objectClassViolation",
        66 => "notAllowedOnNonLeaf",
        67 => "notAllowedOnRDN",
        68 => "entryAlreadyExists",
        69 => "objectClassModsProhibited",
        71 => "affectsMultipleDSAs",
        80 => "other",
        88 => "abandoned",
        _ => "unknown",
    }
}

/// Common components of an LDAP operation result (RFC 4511 section 4.1.9).
///
/// This structure faithfully replicates the components dictated by the
/// standard, and is distinctly C-like with its reliance on numeric codes
/// for the indication of outcome. It would be tempting to hide it behind an
/// automatic `Result`-like interface, but there are scenarios — notably,
/// referrals during Search — where that would preclude intentional handling
/// of non-success codes. Instead, [`success()`](LdapResult::success) and
/// [`non_error()`](LdapResult::non_error) cover the common case.
#[derive(Clone, Debug, Default)]
pub struct LdapResult {
    /// Result code. Zero indicates success; see
    /// [RFC 4511 Appendix A.1](https://datatracker.ietf.org/doc/html/rfc4511#appendix-A.1)
    /// for the rest.
    pub rc: u32,
    /// Matched component DN, where applicable.
    pub matched: String,
    /// Additional diagnostic text.
    pub text: String,
    /// Referral URLs, present when `rc == 10`, or accumulated from Search
    /// Result Reference messages during a Search.
    pub refs: Vec<String>,
    /// Response controls. Missing and empty controls are both represented
    /// by an empty vector.
    pub ctrls: Vec<Control>,
}

impl LdapResult {
    /// If the result code is zero, return `Ok(self)`, otherwise wrap it in
    /// an error.
    pub fn success(self) -> Result<Self> {
        if self.rc == 0 {
            Ok(self)
        } else {
            Err(LdapError::from_result(&self))
        }
    }

    /// Like [`success()`](Self::success), but also accepts `rc == 10`
    /// (referral) as non-error.
    pub fn non_error(self) -> Result<Self> {
        if self.rc == 0 || self.rc == 10 {
            Ok(self)
        } else {
            Err(LdapError::from_result(&self))
        }
    }
}

impl std::fmt::Display for LdapResult {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "rc={} ({}), dn: \"{}\", text: \"{}\"",
            self.rc,
            result_text(self.rc),
            self.matched,
            self.text
        )
    }
}

/// Decode the LDAPResult SEQUENCE shared by every response PDU:
/// `resultCode ENUMERATED, matchedDN OCTET STRING, diagnosticMessage
/// OCTET STRING, referral [3] Referral OPTIONAL`.
pub(crate) fn parse_ldap_result(tags: &mut Vec<StructureTag>) -> LdapResult {
    let mut refs = Vec::new();
    if let Some(last) = tags.last() {
        if last.id == 3 && last.class == ber_codec::common::TagClass::Context {
            let referral_tag = tags.pop().expect("referral tag");
            if let Some(children) = referral_tag.expect_constructed() {
                for c in children {
                    if let Some(bytes) = c.expect_primitive() {
                        refs.push(String::from_utf8_lossy(&bytes).into_owned());
                    }
                }
            }
        }
    }
    let text = tags
        .pop()
        .and_then(|t| t.expect_primitive())
        .map(|b| String::from_utf8_lossy(&b).into_owned())
        .unwrap_or_default();
    let matched = tags
        .pop()
        .and_then(|t| t.expect_primitive())
        .map(|b| String::from_utf8_lossy(&b).into_owned())
        .unwrap_or_default();
    let rc = tags
        .pop()
        .and_then(|t| t.expect_primitive())
        .map(|b| {
            let mut v: i64 = if b.first().map_or(false, |x| x & 0x80 != 0) {
                -1
            } else {
                0
            };
            for byte in b {
                v = (v << 8) | byte as i64;
            }
            v as u32
        })
        .unwrap_or(1);
    LdapResult {
        rc,
        matched,
        text,
        refs,
        ctrls: Vec::new(),
    }
}

/// Build the three- or four-component LDAPResult sequence from its parts,
/// used when a request needs to self-construct a synthetic result (e.g.
/// a local error that never reached the wire).
pub(crate) fn ldap_result_tags(rc: u32, matched: &str, text: &str) -> Vec<Tag> {
    vec![
        Tag::Enumerated(ber_codec::structures::Enumerated {
            inner: rc as i64,
            id: Types::Enumerated as u64,
            ..Default::default()
        }),
        Tag::OctetString(ber_codec::structures::OctetString {
            inner: matched.as_bytes().to_vec(),
            ..Default::default()
        }),
        Tag::OctetString(ber_codec::structures::OctetString {
            inner: text.as_bytes().to_vec(),
            ..Default::default()
        }),
    ]
}

/// Wrapper for the result of a Search operation which returns all entries
/// at once. Exists so that `success()`/`non_error()` can be called the same
/// way as on a bare `LdapResult`.
#[derive(Clone, Debug)]
pub struct SearchResult(pub Vec<crate::search::ResultEntry>, pub LdapResult);

impl SearchResult {
    pub fn success(self) -> Result<(Vec<crate::search::ResultEntry>, LdapResult)> {
        if self.1.rc == 0 {
            Ok((self.0, self.1))
        } else {
            Err(LdapError::from_result(&self.1))
        }
    }

    pub fn non_error(self) -> Result<(Vec<crate::search::ResultEntry>, LdapResult)> {
        if self.1.rc == 0 || self.1.rc == 10 {
            Ok((self.0, self.1))
        } else {
            Err(LdapError::from_result(&self.1))
        }
    }
}

/// Wrapper for the result of a Compare operation.
///
/// Compare uniquely has two non-zero result codes to indicate the outcome
/// of a successful comparison, while other codes indicate errors as usual
/// (except 10, referral). [`equal()`](Self::equal) optimizes for the
/// expected case of ignoring referrals; [`non_error()`](Self::non_error)
/// can be used when that's not possible.
#[derive(Clone, Debug)]
pub struct CompareResult(pub LdapResult);

impl CompareResult {
    pub fn equal(self) -> Result<bool> {
        match self.0.rc {
            5 => Ok(false),
            6 => Ok(true),
            _ => Err(LdapError::from_result(&self.0)),
        }
    }

    pub fn non_error(self) -> Result<LdapResult> {
        if self.0.rc == 5 || self.0.rc == 6 || self.0.rc == 10 {
            Ok(self.0)
        } else {
            Err(LdapError::from_result(&self.0))
        }
    }
}

/// Wrapper for the result of an Extended operation: the generic result
/// plus the decoded response exop, if the server sent one.
#[derive(Clone, Debug)]
pub struct ExopResult(pub Exop, pub LdapResult);

impl ExopResult {
    pub fn success(self) -> Result<(Exop, LdapResult)> {
        if self.1.rc == 0 {
            Ok((self.0, self.1))
        } else {
            Err(LdapError::from_result(&self.1))
        }
    }

    pub fn non_error(self) -> Result<(Exop, LdapResult)> {
        if self.1.rc == 0 || self.1.rc == 10 {
            Ok((self.0, self.1))
        } else {
            Err(LdapError::from_result(&self.1))
        }
    }
}

