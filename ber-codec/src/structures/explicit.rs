use crate::common::TagClass;
use crate::structure::{PL, StructureTag};

use super::{ASNTag, Tag};

/// A CHOICE or OPTIONAL alternative wrapped in an explicit context tag,
/// i.e. the outer tag is constructed and contains exactly the one
/// re-tagged inner element. LDAP mostly uses implicit tagging (the
/// per-variant `id`/`class` on the wrapper structs themselves), but a
/// handful of fields — e.g. the credentials choice inside SASL
/// mechanisms, and some control values — need an explicit wrapper.
#[derive(Clone, Debug, PartialEq)]
pub struct ExplicitTag {
    pub id: u64,
    pub class: TagClass,
    pub inner: Box<Tag>,
}

impl Default for ExplicitTag {
    fn default() -> Self {
        ExplicitTag {
            id: 0,
            class: TagClass::Context,
            inner: Box::new(Tag::Null(Default::default())),
        }
    }
}

impl ASNTag for ExplicitTag {
    fn into_structure(self) -> StructureTag {
        StructureTag {
            class: self.class,
            id: self.id,
            payload: PL::C(vec![self.inner.into_structure()]),
        }
    }
}
