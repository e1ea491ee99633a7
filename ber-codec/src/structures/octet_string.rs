use crate::common::TagClass;
use crate::structure::{PL, StructureTag};
use crate::universal::Types;

use super::ASNTag;

/// An OCTET STRING element. LDAP uses this for every string-ish value —
/// DNs, attribute names and values, SASL credentials — since the
/// protocol has no notion of character encoding below the application
/// layer; it's all opaque octets on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OctetString {
    pub id: u64,
    pub class: TagClass,
    pub inner: Vec<u8>,
}

impl Default for OctetString {
    fn default() -> Self {
        OctetString {
            id: Types::OctetString as u64,
            class: TagClass::Universal,
            inner: Vec::new(),
        }
    }
}

impl ASNTag for OctetString {
    fn into_structure(self) -> StructureTag {
        StructureTag {
            class: self.class,
            id: self.id,
            payload: PL::P(self.inner),
        }
    }
}
