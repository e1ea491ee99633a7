//! Control construction and parsing. See the `controls` module docs at the
//! crate root for the request/response conventions shared by every
//! control implemented here.

use ber_codec::common::TagClass;
use ber_codec::structure::{StructureTag, PL};
use ber_codec::structures::{ASNTag, Boolean, OctetString, Sequence, Tag};
use ber_codec::universal::Types;

use crate::result::Result;

pub mod types {
    //! Tags identifying the controls this crate parses out of the wire by
    //! OID. Not exhaustive — a control whose OID isn't in this list still
    //! round-trips as a [`RawControl`](super::RawControl), just without a
    //! known type attached.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    #[non_exhaustive]
    pub enum ControlType {
        Assertion,
        ManageDsaIt,
        MatchedValues,
        PagedResults,
        PostRead,
        PreRead,
        ProxyAuth,
        RelaxRules,
    }
}
use self::types::ControlType;

mod assertion;
mod manage_dsa_it;
mod matched_values;
mod paged_results;
mod proxy_auth;
mod read_entry;
mod relax_rules;

pub use self::assertion::Assertion;
pub use self::manage_dsa_it::ManageDsaIt;
pub use self::matched_values::MatchedValues;
pub use self::paged_results::PagedResults;
pub use self::proxy_auth::ProxyAuth;
pub use self::read_entry::{PostRead, PostReadResp, PreRead, PreReadResp, ReadEntryResp};
pub use self::relax_rules::RelaxRules;

fn known_type(oid: &str) -> Option<ControlType> {
    match oid {
        assertion::ASSERTION_OID => Some(ControlType::Assertion),
        manage_dsa_it::MANAGE_DSA_IT_OID => Some(ControlType::ManageDsaIt),
        matched_values::MATCHED_VALUES_OID => Some(ControlType::MatchedValues),
        paged_results::PAGED_RESULTS_OID => Some(ControlType::PagedResults),
        read_entry::POST_READ_OID => Some(ControlType::PostRead),
        read_entry::PRE_READ_OID => Some(ControlType::PreRead),
        proxy_auth::PROXY_AUTH_OID => Some(ControlType::ProxyAuth),
        relax_rules::RELAX_RULES_OID => Some(ControlType::RelaxRules),
        _ => None,
    }
}

/// Identifies the control by OID, for use with
/// [`with_controls()`](crate::Ldap::with_controls) and
/// [`critical()`](MakeCritical::critical).
pub trait Oid {
    /// The control's OID.
    fn oid(&self) -> &'static str;
    /// The control's `controlValue`, already BER-encoded, or `None` for a
    /// flag control that carries no value.
    fn value(&self) -> Option<Vec<u8>>;
}

/// Enables `.critical()` on any control implementing [`Oid`], marking it
/// critical (the server must reject the request if it doesn't recognize
/// or can't honor the control) when it's sent.
pub trait MakeCritical: Oid + Sized {
    fn critical(self) -> CriticalControl<Self> {
        CriticalControl { control: self }
    }
}

impl<T: Oid> MakeCritical for T {}

/// A control wrapped by [`MakeCritical::critical()`], sent with the
/// `criticality` flag set.
pub struct CriticalControl<T> {
    control: T,
}

impl<T: Oid> From<CriticalControl<T>> for Control {
    fn from(cc: CriticalControl<T>) -> Control {
        Control(
            None,
            RawControl {
                ctype: cc.control.oid().to_owned(),
                crit: true,
                val: cc.control.value(),
            },
        )
    }
}

impl<T: Oid> From<T> for Control {
    fn from(c: T) -> Control {
        Control(
            None,
            RawControl {
                ctype: c.oid().to_owned(),
                crit: false,
                val: c.value(),
            },
        )
    }
}

/// Parses a recognized control's `controlValue` into a concrete type.
/// Never panics on malformed server input; it reports a [`Decoding`
/// error](crate::LdapError::Decoding) instead.
pub trait ControlParser: Sized {
    fn parse(val: &[u8]) -> Result<Self>;
}

/// A response control: the recognized [`ControlType`] if this crate knows
/// the control's OID, plus its raw, OID-and-bytes form (always present,
/// regardless of recognition).
///
/// Derefs to the inner [`RawControl`] for convenience (`ctrl.ctype`,
/// `ctrl.crit`, `ctrl.val` all resolve through it).
#[derive(Clone, Debug)]
pub struct Control(pub Option<ControlType>, pub RawControl);

impl std::ops::Deref for Control {
    type Target = RawControl;

    fn deref(&self) -> &RawControl {
        &self.1
    }
}

/// A control in its generic, OID-and-bytes form: what every control looks
/// like on the wire before (or absent) interpretation by a
/// [`ControlParser`].
#[derive(Clone, Debug)]
pub struct RawControl {
    pub ctype: String,
    pub crit: bool,
    pub val: Option<Vec<u8>>,
}

impl RawControl {
    /// Parse this control's value as `T`, a recognized control type.
    pub fn parse<T: ControlParser>(&self) -> Result<T> {
        T::parse(self.val.as_deref().unwrap_or(&[]))
    }
}

impl From<RawControl> for StructureTag {
    fn from(ctrl: RawControl) -> StructureTag {
        construct_control(&ctrl.ctype, ctrl.crit, ctrl.val)
    }
}

impl From<Control> for StructureTag {
    fn from(ctrl: Control) -> StructureTag {
        StructureTag::from(ctrl.1)
    }
}

/// Build the `Control ::= SEQUENCE { controlType LDAPOID, criticality
/// BOOLEAN DEFAULT FALSE, controlValue OCTET STRING OPTIONAL }` sequence
/// (RFC 4511 section 4.1.11).
pub fn construct_control(oid: &str, crit: bool, val: Option<Vec<u8>>) -> StructureTag {
    let mut seq = vec![Tag::OctetString(OctetString {
        inner: Vec::from(oid.as_bytes()),
        ..Default::default()
    })];
    if crit {
        seq.push(Tag::Boolean(Boolean {
            inner: true,
            ..Default::default()
        }));
    }
    if let Some(val) = val {
        seq.push(Tag::OctetString(OctetString {
            inner: val,
            ..Default::default()
        }));
    }
    Tag::Sequence(Sequence {
        inner: seq,
        ..Default::default()
    })
    .into_structure()
}

/// Decode the `Controls ::= SEQUENCE OF Control` sequence that may follow
/// any LDAPMessage (RFC 4511 section 4.1.11). Malformed individual
/// controls are skipped rather than failing the whole response, since a
/// control the client doesn't understand shouldn't block delivery of the
/// message it's attached to.
pub(crate) fn parse_controls(tags: Vec<StructureTag>) -> Vec<Control> {
    let mut ctrls = Vec::with_capacity(tags.len());
    for ctrl in tags {
        let mut components = match ctrl.expect_constructed() {
            Some(c) => c.into_iter(),
            None => continue,
        };
        let ctype = match components
            .next()
            .and_then(|t| t.expect_primitive())
            .and_then(|b| String::from_utf8(b).ok())
        {
            Some(s) => s,
            None => continue,
        };
        let next = components.next();
        let (crit, maybe_val) = match next {
            None => (false, None),
            Some(StructureTag {
                id,
                payload: PL::P(ref v),
                ..
            }) if id == Types::Boolean as u64 => (v.first().map_or(false, |&b| b != 0), components.next()),
            Some(t) if t.id == Types::OctetString as u64 => (false, Some(t)),
            _ => (false, None),
        };
        let val = maybe_val.and_then(|t| t.expect_primitive());
        let known = known_type(&ctype);
        ctrls.push(Control(known, RawControl { ctype, crit, val }));
    }
    ctrls
}
