use ber_codec::common::TagClass;
use ber_codec::structures::{OctetString, Tag};

mod passmod;
pub use self::passmod::{PasswordModify, PasswordModifyResp};

mod starttls;
pub(crate) use self::starttls::StartTls;

mod whoami;
pub use self::whoami::{WhoAmI, WhoAmIResp};

use crate::result::{LdapError, Result};

/// A generic extended operation: an OID naming it, and an optional opaque value.
#[derive(Clone, Debug)]
pub struct Exop {
    pub name: Option<String>,
    pub val: Option<Vec<u8>>,
}

/// Parses the value of a response exop into a concrete type.
pub trait ExopParser: Sized {
    fn parse(val: &[u8]) -> Result<Self>;
}

pub(crate) fn parse_exop<T: ExopParser>(val: &[u8]) -> Result<T> {
    T::parse(val)
}

impl From<Exop> for Vec<Tag> {
    fn from(exop: Exop) -> Vec<Tag> {
        construct_exop(exop)
    }
}

pub(crate) fn construct_exop(exop: Exop) -> Vec<Tag> {
    let name = exop.name.expect("extended operation request is missing its OID");
    let mut seq = vec![Tag::OctetString(OctetString {
        id: 0,
        class: TagClass::Context,
        inner: name.into_bytes(),
    })];
    if let Some(val) = exop.val {
        seq.push(Tag::OctetString(OctetString {
            id: 1,
            class: TagClass::Context,
            inner: val,
        }));
    }
    seq
}

pub(crate) fn missing_value(what: &'static str) -> LdapError {
    LdapError::Decoding(format!("missing {what} in extended operation response"))
}
