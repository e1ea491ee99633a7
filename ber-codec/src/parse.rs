//! Decoding: raw bytes to [`StructureTag`](crate::structure::StructureTag).
//!
//! Every parser here uses nom's `streaming` combinators, so a short read
//! off a socket yields `Err(nom::Err::Incomplete(_))` rather than a hard
//! parse error; callers (the LDAP message framer in particular) buffer
//! more bytes and retry rather than treating a partial frame as garbage.

use nom::bits::streaming::take as take_bits;
use nom::bytes::streaming::take as take_bytes;
use nom::combinator::map_opt;
use nom::error::{Error as NomError, ErrorKind};
use nom::number::streaming::be_u8;
use nom::sequence::tuple;
use nom::IResult;

use crate::common::{TagClass, TagStructure};
use crate::structure::{PL, StructureTag};

type BitInput<'a> = (&'a [u8], usize);

fn class_bits(input: BitInput) -> IResult<BitInput, TagClass> {
    map_opt(take_bits(2usize), TagClass::from_u8)(input)
}

fn pc_bit(input: BitInput) -> IResult<BitInput, TagStructure> {
    map_opt(take_bits(1usize), TagStructure::from_u8)(input)
}

fn tagnr_bits(input: BitInput) -> IResult<BitInput, u64> {
    take_bits(5usize)(input)
}

/// High-tag-number form (tag number >= 31): a run of base-128 octets,
/// continuation bit set on all but the last. LDAP never emits one, but a
/// decoder that can't read one would choke on an otherwise well-formed
/// element from a future protocol extension.
fn parse_high_tag_number(input: &[u8]) -> IResult<&[u8], u64> {
    let mut id: u64 = 0;
    let mut rest = input;
    loop {
        let (r, byte) = be_u8(rest)?;
        rest = r;
        id = (id << 7) | (byte & 0x7f) as u64;
        if byte & 0x80 == 0 {
            break;
        }
    }
    Ok((rest, id))
}

/// Parse the identifier octet(s): class, primitive/constructed bit, tag number.
pub fn parse_type_header(input: &[u8]) -> IResult<&[u8], (TagClass, TagStructure, u64)> {
    let (input, (class, pc, tagnr)) =
        nom::bits::bits::<_, _, NomError<BitInput>, _, _>(tuple((class_bits, pc_bit, tagnr_bits)))(
            input,
        )?;
    if tagnr < 31 {
        Ok((input, (class, pc, tagnr)))
    } else {
        let (input, id) = parse_high_tag_number(input)?;
        Ok((input, (class, pc, id)))
    }
}

/// Parse a definite-length length octet sequence. Indefinite length
/// (first octet `0x80`) and the reserved value (`0xff`) are both
/// rejected: LDAP's BER profile (RFC 4511 section 5.1) requires definite
/// lengths throughout.
pub fn parse_length(input: &[u8]) -> IResult<&[u8], u64> {
    let (input, first) = be_u8(input)?;
    if first & 0x80 == 0 {
        return Ok((input, first as u64));
    }
    let n = first & 0x7f;
    if n == 0 || n == 0x7f {
        return Err(nom::Err::Failure(NomError::new(input, ErrorKind::Verify)));
    }
    let (input, bytes) = take_bytes(n as usize)(input)?;
    Ok((input, parse_uint(bytes)?.1))
}

/// Interpret a byte string as an unsigned big-endian integer. Used both
/// for long-form lengths and for decoding INTEGER/ENUMERATED payloads
/// whose sign is known from context to be non-negative (e.g. message IDs).
pub fn parse_uint(input: &[u8]) -> IResult<&[u8], u64> {
    Ok((
        &input[input.len()..],
        input.iter().fold(0u64, |res, &byte| (res << 8) | byte as u64),
    ))
}

/// Parse one complete BER element, recursing into children for
/// constructed tags.
pub fn parse_tag(input: &[u8]) -> IResult<&[u8], StructureTag> {
    let (input, (class, structure, id)) = parse_type_header(input)?;
    let (input, len) = parse_length(input)?;
    let (input, content) = take_bytes(len as usize)(input)?;

    let payload = match structure {
        TagStructure::Primitive => PL::P(content.to_vec()),
        TagStructure::Constructed => {
            let mut children = Vec::new();
            let mut rest = content;
            while !rest.is_empty() {
                let (r, child) = parse_tag(rest)?;
                rest = r;
                children.push(child);
            }
            PL::C(children)
        }
    };

    Ok((input, StructureTag { class, id, payload }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_octet_string() {
        let bytes = vec![4u8, 2, 255, 127];
        let (rest, tag) = parse_tag(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(tag.class, TagClass::Universal);
        assert_eq!(tag.id, 4);
        assert_eq!(tag.payload, PL::P(vec![255, 127]));
    }

    #[test]
    fn constructed_sequence() {
        let bytes = vec![
            48, 14, 12, 12, 72, 101, 108, 108, 111, 32, 87, 111, 114, 108, 100, 33,
        ];
        let (rest, tag) = parse_tag(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(tag.id, 16);
        let children = tag.expect_constructed().unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, 12);
    }

    #[test]
    fn long_form_length() {
        let mut bytes = vec![4u8, 0x81, 0x80];
        bytes.extend(std::iter::repeat(b'x').take(128));
        let (rest, tag) = parse_tag(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(tag.expect_primitive().unwrap().len(), 128);
    }

    #[test]
    fn reserved_length_byte_rejected() {
        let bytes = vec![4u8, 0xff];
        assert!(parse_tag(&bytes).is_err());
    }

    #[test]
    fn incomplete_frame_requests_more_data() {
        let bytes = vec![4u8, 5, 1, 2];
        match parse_tag(&bytes) {
            Err(nom::Err::Incomplete(_)) => {}
            other => panic!("expected Incomplete, got {other:?}"),
        }
    }

    #[test]
    fn high_tag_number_form_decodes() {
        // class=Application, constructed, tag number 0x1F -> extended, value 300 (0x84 0x2c)
        let bytes = vec![0x7f, 0x84, 0x2c, 2, 9, 9];
        let (rest, tag) = parse_tag(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(tag.id, 300);
    }
}
