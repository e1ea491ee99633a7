use crate::common::TagClass;
use crate::structure::{PL, StructureTag};
use crate::universal::Types;

use super::ASNTag;

/// A BOOLEAN element. LDAP encodes TRUE as `0xff` and FALSE as `0x00`,
/// never any other nonzero byte, even though BER permits it for TRUE.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Boolean {
    pub id: u64,
    pub class: TagClass,
    pub inner: bool,
}

impl Default for Boolean {
    fn default() -> Self {
        Boolean {
            id: Types::Boolean as u64,
            class: TagClass::Universal,
            inner: false,
        }
    }
}

impl ASNTag for Boolean {
    fn into_structure(self) -> StructureTag {
        StructureTag {
            class: self.class,
            id: self.id,
            payload: PL::P(vec![if self.inner { 0xff } else { 0x00 }]),
        }
    }
}
