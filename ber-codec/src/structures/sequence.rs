use crate::common::TagClass;
use crate::structure::{PL, StructureTag};
use crate::universal::Types;

use super::{ASNTag, Tag};

/// A SEQUENCE element: an ordered, heterogeneous list of children.
/// Protocol ops, attribute-value-assertions and the envelope itself are
/// all sequences.
#[derive(Clone, Debug, PartialEq)]
pub struct Sequence {
    pub id: u64,
    pub class: TagClass,
    pub inner: Vec<Tag>,
}

impl Default for Sequence {
    fn default() -> Self {
        Sequence {
            id: Types::Sequence as u64,
            class: TagClass::Universal,
            inner: Vec::new(),
        }
    }
}

impl ASNTag for Sequence {
    fn into_structure(self) -> StructureTag {
        StructureTag {
            class: self.class,
            id: self.id,
            payload: PL::C(self.inner.into_iter().map(ASNTag::into_structure).collect()),
        }
    }
}

/// A SET (OF) element. Same wire shape as SEQUENCE; LDAP uses it for
/// attribute-value lists, where DER would normally require a sorted
/// encoding but LDAP's BER profile does not.
#[derive(Clone, Debug, PartialEq)]
pub struct Set {
    pub id: u64,
    pub class: TagClass,
    pub inner: Vec<Tag>,
}

impl Default for Set {
    fn default() -> Self {
        Set {
            id: Types::Set as u64,
            class: TagClass::Universal,
            inner: Vec::new(),
        }
    }
}

impl ASNTag for Set {
    fn into_structure(self) -> StructureTag {
        StructureTag {
            class: self.class,
            id: self.id,
            payload: PL::C(self.inner.into_iter().map(ASNTag::into_structure).collect()),
        }
    }
}
