use crate::common::TagClass;
use crate::structure::{PL, StructureTag};
use crate::universal::Types;

use super::ASNTag;

/// A NULL element. LDAP uses it as the body of the unbind request and as
/// the simple-absent marker in a couple of optional fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Null {
    pub id: u64,
    pub class: TagClass,
    pub inner: (),
}

impl Default for Null {
    fn default() -> Self {
        Null {
            id: Types::Null as u64,
            class: TagClass::Universal,
            inner: (),
        }
    }
}

impl ASNTag for Null {
    fn into_structure(self) -> StructureTag {
        StructureTag {
            class: self.class,
            id: self.id,
            payload: PL::P(Vec::new()),
        }
    }
}
