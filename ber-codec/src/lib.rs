//! A minimal ASN.1 BER encoder/decoder covering the subset LDAP needs:
//! definite-length tags, universal primitives (BOOLEAN, INTEGER,
//! ENUMERATED, OCTET STRING, NULL), and the constructed SEQUENCE/SET/
//! context-tag shapes that make up every protocol op and control.
//!
//! This crate knows nothing about LDAP itself; it only turns bytes into
//! [`structure::StructureTag`] trees and back. The `ldap-client` crate's
//! `asn1` module layers LDAP's specific tag assignments on top.

pub mod common;
pub mod parse;
pub mod structure;
pub mod structures;
pub mod text;
pub mod universal;
pub mod write;

pub use common::{TagClass, TagStructure};
pub use parse::{parse_length, parse_tag, parse_type_header, parse_uint};
pub use structure::{PL, StructureTag};
pub use structures::{
    ASNTag, Boolean, Enumerated, ExplicitTag, Integer, Null, OctetString, Sequence, Set, Tag,
};
pub use text::{decode_text, DecodeOptions};
pub use write::{write_tag, write_tag_into};
