//! Tag class and primitive/constructed bits shared by every BER element.

/// The class portion of a BER tag.
///
/// Universal tags (`INTEGER`, `SEQUENCE`, ...) are defined by X.680/X.690.
/// LDAP additionally uses Application tags (the top-level protocol ops) and
/// Context tags (CHOICE/OPTIONAL alternatives inside a protocol op).
/// Private is part of the standard but unused by LDAP itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TagClass {
    Universal,
    Application,
    Context,
    Private,
}

impl TagClass {
    pub fn from_u8(v: u8) -> Option<TagClass> {
        match v {
            0 => Some(TagClass::Universal),
            1 => Some(TagClass::Application),
            2 => Some(TagClass::Context),
            3 => Some(TagClass::Private),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            TagClass::Universal => 0,
            TagClass::Application => 1,
            TagClass::Context => 2,
            TagClass::Private => 3,
        }
    }
}

/// Whether a tag's value is a single opaque octet string (primitive) or a
/// sequence of nested elements (constructed).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TagStructure {
    Primitive,
    Constructed,
}

impl TagStructure {
    pub fn from_u8(v: u8) -> Option<TagStructure> {
        match v {
            0 => Some(TagStructure::Primitive),
            1 => Some(TagStructure::Constructed),
            _ => None,
        }
    }
}
