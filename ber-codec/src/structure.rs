//! The untyped, fully decoded BER element: [`StructureTag`].
//!
//! This is the codec's "bag of bytes" representation. Type-specific
//! wrappers in [`crate::structures`] convert to and from it; nothing
//! above this layer needs to know how tags and lengths are laid out on
//! the wire.

use crate::common::TagClass;

/// Payload of a decoded element: either the raw value bytes of a
/// primitive element, or the fully decoded children of a constructed one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PL {
    P(Vec<u8>),
    C(Vec<StructureTag>),
}

/// A fully decoded BER element: tag class, tag number, and payload.
///
/// The constructed/primitive bit isn't stored separately; it's implied by
/// the `PL` variant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructureTag {
    pub class: TagClass,
    pub id: u64,
    pub payload: PL,
}

impl StructureTag {
    /// Return `self` if its class matches, otherwise `None`.
    pub fn match_class(self, class: TagClass) -> Option<Self> {
        if self.class == class {
            Some(self)
        } else {
            None
        }
    }

    /// Return `self` if its tag number matches, otherwise `None`.
    pub fn match_id(self, id: u64) -> Option<Self> {
        if self.id == id {
            Some(self)
        } else {
            None
        }
    }

    /// Unwrap a primitive element's bytes, or `None` if constructed.
    pub fn expect_primitive(self) -> Option<Vec<u8>> {
        match self.payload {
            PL::P(v) => Some(v),
            PL::C(_) => None,
        }
    }

    /// Unwrap a constructed element's children, or `None` if primitive.
    pub fn expect_constructed(self) -> Option<Vec<StructureTag>> {
        match self.payload {
            PL::C(v) => Some(v),
            PL::P(_) => None,
        }
    }
}
