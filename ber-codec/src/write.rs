//! Encoding: [`StructureTag`](crate::structure::StructureTag) to bytes.

use bytes::BufMut;

use crate::common::TagClass;
use crate::structure::{PL, StructureTag};

fn write_identifier(out: &mut Vec<u8>, class: TagClass, constructed: bool, id: u64) {
    let pc = if constructed { 0x20 } else { 0x00 };
    if id < 31 {
        out.push((class.to_u8() << 6) | pc | id as u8);
    } else {
        out.push((class.to_u8() << 6) | pc | 0x1f);
        let mut octets = Vec::new();
        let mut v = id;
        octets.push((v & 0x7f) as u8);
        v >>= 7;
        while v > 0 {
            octets.push((v & 0x7f) as u8 | 0x80);
            v >>= 7;
        }
        octets.reverse();
        out.extend_from_slice(&octets);
    }
}

fn write_length(out: &mut Vec<u8>, len: usize) {
    if len < 128 {
        out.push(len as u8);
        return;
    }
    let bytes = (len as u64).to_be_bytes();
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(7);
    let body = &bytes[start..];
    out.push(0x80 | body.len() as u8);
    out.extend_from_slice(body);
}

/// Serialize a decoded element back to wire bytes.
pub fn write_tag(out: &mut Vec<u8>, tag: &StructureTag) {
    match &tag.payload {
        PL::P(bytes) => {
            write_identifier(out, tag.class, false, tag.id);
            write_length(out, bytes.len());
            out.extend_from_slice(bytes);
        }
        PL::C(children) => {
            let mut body = Vec::new();
            for child in children {
                write_tag(&mut body, child);
            }
            write_identifier(out, tag.class, true, tag.id);
            write_length(out, body.len());
            out.extend_from_slice(&body);
        }
    }
}

/// Serialize directly into a `bytes::BytesMut`-backed buffer, as used by
/// the message framer's `Encoder` implementation.
pub fn write_tag_into<B: BufMut>(buf: &mut B, tag: &StructureTag) {
    let mut out = Vec::new();
    write_tag(&mut out, tag);
    buf.put_slice(&out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_tag;

    #[test]
    fn short_length_roundtrip() {
        let tag = StructureTag {
            class: TagClass::Universal,
            id: 4,
            payload: PL::P(vec![1, 2, 3]),
        };
        let mut out = Vec::new();
        write_tag(&mut out, &tag);
        assert_eq!(out, vec![4, 3, 1, 2, 3]);
        let (rest, decoded) = parse_tag(&out).unwrap();
        assert!(rest.is_empty());
        assert_eq!(decoded, tag);
    }

    #[test]
    fn long_length_minimal_form() {
        let tag = StructureTag {
            class: TagClass::Universal,
            id: 4,
            payload: PL::P(vec![0u8; 200]),
        };
        let mut out = Vec::new();
        write_tag(&mut out, &tag);
        assert_eq!(out[1], 0x81);
        assert_eq!(out[2], 200);
    }

    #[test]
    fn constructed_roundtrip() {
        let inner = StructureTag {
            class: TagClass::Universal,
            id: 4,
            payload: PL::P(b"hi".to_vec()),
        };
        let outer = StructureTag {
            class: TagClass::Universal,
            id: 16,
            payload: PL::C(vec![inner]),
        };
        let mut out = Vec::new();
        write_tag(&mut out, &outer);
        let (rest, decoded) = parse_tag(&out).unwrap();
        assert!(rest.is_empty());
        assert_eq!(decoded, outer);
    }

    #[test]
    fn never_emits_multi_byte_tag_for_small_ids() {
        let tag = StructureTag {
            class: TagClass::Application,
            id: 0,
            payload: PL::P(vec![]),
        };
        let mut out = Vec::new();
        write_tag(&mut out, &tag);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0] & 0x1f, 0);
    }
}
