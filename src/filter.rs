//! Parser for the string representation of search filters
//! ([RFC 4515](https://tools.ietf.org/html/rfc4515)), producing the BER
//! `Filter` CHOICE (RFC 4511 section 4.5.1.7) directly as a [`Tag`].

use nom::branch::alt;
use nom::bytes::complete::{tag, take_while, take_while1};
use nom::character::complete::{char, digit1};
use nom::character::is_hex_digit;
use nom::combinator::{map, map_res, opt, recognize, verify};
use nom::multi::{fold_many0, many0, many1};
use nom::sequence::{delimited, preceded};
use nom::IResult;

use ber_codec::common::TagClass;
use ber_codec::structures::{Boolean, ExplicitTag, OctetString, Sequence, Tag};

use crate::result::{LdapError, Result};

/// Parse a filter string into the `Filter` BER structure used in a
/// SearchRequest.
pub fn parse(input: &str) -> Result<Tag> {
    let (rest, t) =
        filtexpr(input.as_bytes()).map_err(|_| LdapError::FilterParsing(input.to_owned()))?;
    if !rest.is_empty() {
        return Err(LdapError::FilterParsing(input.to_owned()));
    }
    Ok(t)
}

/// Parse the `(attr=val)(attr=val)...` list used as a Matched Values
/// control value ([RFC 3876](https://tools.ietf.org/html/rfc3876)).
pub(crate) fn parse_matched_values(input: &str) -> Result<Tag> {
    let (rest, t) =
        mv_filtexpr(input.as_bytes()).map_err(|_| LdapError::FilterParsing(input.to_owned()))?;
    if !rest.is_empty() {
        return Err(LdapError::FilterParsing(input.to_owned()));
    }
    Ok(t)
}

const AND_FILT: u64 = 0;
const OR_FILT: u64 = 1;
const NOT_FILT: u64 = 2;

const EQ_MATCH: u64 = 3;
const SUBSTR_MATCH: u64 = 4;
const GTE_MATCH: u64 = 5;
const LTE_MATCH: u64 = 6;
const PRES_MATCH: u64 = 7;
const APPROX_MATCH: u64 = 8;
const EXT_MATCH: u64 = 9;

const SUB_INITIAL: u64 = 0;
const SUB_ANY: u64 = 1;
const SUB_FINAL: u64 = 2;

type ParseResult<'a, O> = IResult<&'a [u8], O>;

fn filtexpr(input: &[u8]) -> ParseResult<Tag> {
    alt((filter, item))(input)
}

fn filter(input: &[u8]) -> ParseResult<Tag> {
    delimited(char('('), filtercomp, char(')'))(input)
}

fn filtercomp(input: &[u8]) -> ParseResult<Tag> {
    alt((and, or, not, item))(input)
}

fn filterlist(input: &[u8]) -> ParseResult<Vec<Tag>> {
    many0(filter)(input)
}

fn mv_filtexpr(input: &[u8]) -> ParseResult<Tag> {
    delimited(char('('), mv_filterlist, char(')'))(input)
}

fn mv_filteritems(input: &[u8]) -> ParseResult<Vec<Tag>> {
    many1(delimited(char('('), item, char(')')))(input)
}

fn mv_filterlist(input: &[u8]) -> ParseResult<Tag> {
    map(mv_filteritems, |tagv: Vec<Tag>| {
        Tag::Sequence(Sequence {
            inner: tagv,
            ..Default::default()
        })
    })(input)
}

fn and(input: &[u8]) -> ParseResult<Tag> {
    map(preceded(char('&'), filterlist), |tagv: Vec<Tag>| {
        Tag::Sequence(Sequence {
            class: TagClass::Context,
            id: AND_FILT,
            inner: tagv,
        })
    })(input)
}

fn or(input: &[u8]) -> ParseResult<Tag> {
    map(preceded(char('|'), filterlist), |tagv: Vec<Tag>| {
        Tag::Sequence(Sequence {
            class: TagClass::Context,
            id: OR_FILT,
            inner: tagv,
        })
    })(input)
}

fn not(input: &[u8]) -> ParseResult<Tag> {
    map(preceded(char('!'), filter), |tag: Tag| {
        Tag::ExplicitTag(ExplicitTag {
            class: TagClass::Context,
            id: NOT_FILT,
            inner: Box::new(tag),
        })
    })(input)
}

fn item(input: &[u8]) -> ParseResult<Tag> {
    alt((eq, non_eq, extensible))(input)
}

/// Tracks hex-escape state while folding over a filter assertion value's
/// raw bytes; `\NN` pairs are unescaped a byte at a time.
#[derive(Clone)]
enum Unescaper {
    WantFirst,
    WantSecond(u8),
    Value(u8),
    Error,
}

impl Unescaper {
    fn feed(&self, c: u8) -> Unescaper {
        match *self {
            Unescaper::Error => Unescaper::Error,
            Unescaper::WantFirst => {
                if is_hex_digit(c) {
                    Unescaper::WantSecond(c - if c <= b'9' { b'0' } else { (c & 0x20) + b'A' - 10 })
                } else {
                    Unescaper::Error
                }
            }
            Unescaper::WantSecond(partial) => {
                if is_hex_digit(c) {
                    Unescaper::Value((partial << 4) + (c - if c <= b'9' { b'0' } else { (c & 0x20) + b'A' - 10 }))
                } else {
                    Unescaper::Error
                }
            }
            Unescaper::Value(_v) => {
                if c != b'\\' {
                    Unescaper::Value(c)
                } else {
                    Unescaper::WantFirst
                }
            }
        }
    }
}

// Any byte in the assertion value may be represented by \NN, where N is a
// hex digit. Parentheses, asterisk, and backslash itself must be.
fn unescaped(input: &[u8]) -> ParseResult<Vec<u8>> {
    map_res(
        fold_many0(
            verify(nom::number::complete::u8, |&c| is_value_char(c)),
            (Unescaper::Value(0), Vec::new()),
            |(mut u, mut vec): (Unescaper, Vec<u8>), c: u8| {
                u = u.feed(c);
                if let Unescaper::Value(c) = u {
                    vec.push(c);
                }
                (u, vec)
            },
        ),
        |(u, vec): (Unescaper, Vec<u8>)| -> std::result::Result<Vec<u8>, ()> {
            if let Unescaper::Value(_) = u {
                Ok(vec)
            } else {
                Err(())
            }
        },
    )(input)
}

fn non_eq(input: &[u8]) -> ParseResult<Tag> {
    let (input, attr) = attributedescription(input)?;
    let (input, filterop) = alt((tag(">="), tag("<="), tag("~=")))(input)?;
    let (input, value) = unescaped(input)?;
    Ok((
        input,
        Tag::Sequence(Sequence {
            class: TagClass::Context,
            id: filtertag(filterop),
            inner: vec![
                Tag::OctetString(OctetString {
                    inner: attr.to_vec(),
                    ..Default::default()
                }),
                Tag::OctetString(OctetString {
                    inner: value,
                    ..Default::default()
                }),
            ],
        }),
    ))
}

fn filtertag(filterop: &[u8]) -> u64 {
    match filterop {
        b">=" => GTE_MATCH,
        b"<=" => LTE_MATCH,
        b"~=" => APPROX_MATCH,
        _ => unreachable!("alt restricts filterop to >=, <=, ~="),
    }
}

fn eq(input: &[u8]) -> ParseResult<Tag> {
    let (input, attr) = attributedescription(input)?;
    let (input, _) = char('=')(input)?;
    let (input, initial) = unescaped(input)?;
    let (input, mid_final) = map_res(
        many0(preceded(char('*'), unescaped)),
        |v: Vec<Vec<u8>>| -> std::result::Result<Vec<Vec<u8>>, ()> {
            // an empty element may exist only at the very end; otherwise two adjacent asterisks
            if v.iter()
                .enumerate()
                .any(|(n, ve)| ve.is_empty() && n + 1 != v.len())
            {
                Err(())
            } else {
                Ok(v)
            }
        },
    )(input)?;

    let tag = if mid_final.is_empty() {
        // simple equality, no asterisks in assertion value
        Tag::Sequence(Sequence {
            class: TagClass::Context,
            id: EQ_MATCH,
            inner: vec![
                Tag::OctetString(OctetString {
                    inner: attr.to_vec(),
                    ..Default::default()
                }),
                Tag::OctetString(OctetString {
                    inner: initial,
                    ..Default::default()
                }),
            ],
        })
    } else if initial.is_empty() && mid_final.len() == 1 && mid_final[0].is_empty() {
        // presence, single asterisk in assertion value
        Tag::OctetString(OctetString {
            class: TagClass::Context,
            id: PRES_MATCH,
            inner: attr.to_vec(),
        })
    } else {
        // substring match
        let mut inner = vec![];
        if !initial.is_empty() {
            inner.push(Tag::OctetString(OctetString {
                class: TagClass::Context,
                id: SUB_INITIAL,
                inner: initial,
            }));
        }
        let n = mid_final.len();
        for (i, sub_elem) in mid_final.into_iter().enumerate() {
            if sub_elem.is_empty() {
                break;
            }
            inner.push(Tag::OctetString(OctetString {
                class: TagClass::Context,
                id: if i + 1 != n { SUB_ANY } else { SUB_FINAL },
                inner: sub_elem,
            }));
        }
        Tag::Sequence(Sequence {
            class: TagClass::Context,
            id: SUBSTR_MATCH,
            inner: vec![
                Tag::OctetString(OctetString {
                    inner: attr.to_vec(),
                    ..Default::default()
                }),
                Tag::Sequence(Sequence {
                    inner,
                    ..Default::default()
                }),
            ],
        })
    };
    Ok((input, tag))
}

fn is_value_char(c: u8) -> bool {
    c != 0 && c != b'(' && c != b')' && c != b'*'
}

fn extensible(input: &[u8]) -> ParseResult<Tag> {
    alt((attr_dn_mrule, dn_mrule))(input)
}

fn attr_dn_mrule(input: &[u8]) -> ParseResult<Tag> {
    let (input, attr) = attributedescription(input)?;
    let (input, dn) = opt(tag(":dn"))(input)?;
    let (input, mrule) = opt(preceded(char(':'), attributetype))(input)?;
    let (input, _) = tag(":=")(input)?;
    let (input, value) = unescaped(input)?;
    Ok((input, extensible_tag(mrule, Some(attr), value, dn.is_some())))
}

fn dn_mrule(input: &[u8]) -> ParseResult<Tag> {
    let (input, dn) = opt(tag(":dn"))(input)?;
    let (input, mrule) = preceded(char(':'), attributetype)(input)?;
    let (input, _) = tag(":=")(input)?;
    let (input, value) = unescaped(input)?;
    Ok((input, extensible_tag(Some(mrule), None, value, dn.is_some())))
}

fn extensible_tag(mrule: Option<&[u8]>, attr: Option<&[u8]>, value: Vec<u8>, dn: bool) -> Tag {
    let mut inner = vec![];
    if let Some(mrule) = mrule {
        inner.push(Tag::OctetString(OctetString {
            class: TagClass::Context,
            id: 1,
            inner: mrule.to_vec(),
        }));
    }
    if let Some(attr) = attr {
        inner.push(Tag::OctetString(OctetString {
            class: TagClass::Context,
            id: 2,
            inner: attr.to_vec(),
        }));
    }
    inner.push(Tag::OctetString(OctetString {
        class: TagClass::Context,
        id: 3,
        inner: value,
    }));
    if dn {
        inner.push(Tag::Boolean(Boolean {
            class: TagClass::Context,
            id: 4,
            inner: dn,
        }));
    }
    Tag::Sequence(Sequence {
        class: TagClass::Context,
        id: EXT_MATCH,
        inner,
    })
}

fn attributedescription(input: &[u8]) -> ParseResult<&[u8]> {
    recognize(|i| -> ParseResult<((), Vec<&[u8]>)> {
        let (i, _type) = attributetype(i)?;
        let (i, _opts) = many0(preceded(char(';'), take_while1(is_alnum_hyphen)))(i)?;
        Ok((i, ((), _opts)))
    })(input)
}

fn attributetype(input: &[u8]) -> ParseResult<&[u8]> {
    alt((numericoid, descr))(input)
}

fn numericoid(input: &[u8]) -> ParseResult<&[u8]> {
    recognize(|i| -> ParseResult<(&[u8], Vec<&[u8]>)> {
        let (i, leading) = number(i)?;
        let (i, rest) = many0(preceded(char('.'), number))(i)?;
        Ok((i, (leading, rest)))
    })(input)
}

// A number may be zero, but must not have superfluous leading zeroes.
fn number(input: &[u8]) -> ParseResult<&[u8]> {
    verify(digit1, |d: &[u8]| d.len() == 1 || d[0] != b'0')(input)
}

fn descr(input: &[u8]) -> ParseResult<&[u8]> {
    recognize(|i: &[u8]| -> ParseResult<(u8, &[u8])> {
        let (i, leading) = verify(nom::number::complete::u8, |&c| c.is_ascii_alphabetic())(i)?;
        let (i, rest) = take_while(is_alnum_hyphen)(i)?;
        Ok((i, (leading, rest)))
    })(input)
}

fn is_alnum_hyphen(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'-'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_equality() {
        let tag = parse("(cn=Babs Jensen)").unwrap();
        match tag {
            Tag::Sequence(s) => assert_eq!(s.id, EQ_MATCH),
            _ => panic!("expected Sequence"),
        }
    }

    #[test]
    fn parses_presence() {
        let tag = parse("(cn=*)").unwrap();
        match tag {
            Tag::OctetString(o) => assert_eq!(o.id, PRES_MATCH),
            _ => panic!("expected OctetString"),
        }
    }

    #[test]
    fn parses_substring() {
        let tag = parse("(cn=Bab*Jen*)").unwrap();
        match tag {
            Tag::Sequence(s) => assert_eq!(s.id, SUBSTR_MATCH),
            _ => panic!("expected Sequence"),
        }
    }

    #[test]
    fn parses_and_or_not() {
        assert!(matches!(parse("(&(cn=a)(sn=b))").unwrap(), Tag::Sequence(s) if s.id == AND_FILT));
        assert!(matches!(parse("(|(cn=a)(sn=b))").unwrap(), Tag::Sequence(s) if s.id == OR_FILT));
        assert!(matches!(parse("(!(cn=a))").unwrap(), Tag::ExplicitTag(e) if e.id == NOT_FILT));
    }

    #[test]
    fn parses_extensible_match() {
        let tag = parse("(cn:caseExactMatch:=Fred Flintstone)").unwrap();
        assert!(matches!(tag, Tag::Sequence(s) if s.id == EXT_MATCH));
    }

    #[test]
    fn parses_unescaped_hex() {
        let tag = parse(r"(cn=Parens \28R\29)").unwrap();
        match tag {
            Tag::Sequence(s) => {
                let val = match &s.inner[1] {
                    Tag::OctetString(o) => o.inner.clone(),
                    _ => panic!("expected value OctetString"),
                };
                assert_eq!(val, b"Parens (R)");
            }
            _ => panic!("expected Sequence"),
        }
    }

    #[test]
    fn rejects_unbalanced_filter() {
        assert!(parse("(cn=a").is_err());
    }

    #[test]
    fn rejects_adjacent_asterisks_mid_value() {
        // two empty substrings in the middle would be ambiguous
        assert!(parse("(cn=a**b)").is_err());
    }

    #[test]
    fn matched_values_list_requires_at_least_one_item() {
        assert!(parse_matched_values("()").is_err());
        assert!(parse_matched_values("((cn=a)(sn=b))").is_ok());
    }
}
