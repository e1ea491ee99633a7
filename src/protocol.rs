//! The wire-level message envelope: `LDAPMessage ::= SEQUENCE { messageID
//! MessageID, protocolOp CHOICE { ... }, controls [0] Controls OPTIONAL }`
//! (RFC 4511 section 4.1.1), and the [`tokio_util::codec`] glue that turns
//! a byte stream into a stream of `(messageID, protocolOp, controls)`
//! triples and back.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use ber_codec::common::TagClass;
use ber_codec::structure::{PL, StructureTag};
use ber_codec::structures::{ASNTag, Integer, Sequence, Tag};
use ber_codec::universal::Types;
use ber_codec::write::write_tag;

use crate::controls::{parse_controls, Control};
use crate::ldap::RequestId;
use crate::result::LdapError;

/// A decoded `LDAPMessage`, stripped of its envelope.
pub(crate) type Message = (RequestId, StructureTag, Vec<Control>);

/// Default cap on a single `LDAPMessage`'s encoded size, guarding against
/// a misbehaving or malicious peer declaring an enormous length prefix.
pub(crate) const DEFAULT_MAX_MESSAGE_SIZE: u32 = 20 * 1024 * 1024;

pub(crate) struct LdapCodec {
    pub(crate) max_message_size: u32,
}

impl Default for LdapCodec {
    fn default() -> Self {
        LdapCodec { max_message_size: DEFAULT_MAX_MESSAGE_SIZE }
    }
}

impl Decoder for LdapCodec {
    type Item = Message;
    type Error = LdapError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let consumed = match ber_codec::parse_tag(&buf[..]) {
            Ok((rest, _)) => buf.len() - rest.len(),
            Err(nom::Err::Incomplete(_)) => return Ok(None),
            Err(_) => return Err(LdapError::Decoding("malformed BER element".into())),
        };
        if consumed as u64 > self.max_message_size as u64 {
            return Err(LdapError::Decoding(format!(
                "LDAPMessage of {consumed} bytes exceeds the {}-byte limit",
                self.max_message_size
            )));
        }
        let (_, tag) =
            ber_codec::parse_tag(&buf[..consumed]).expect("re-parse of already-validated bytes");
        buf.split_to(consumed);

        let mut tags = tag
            .match_id(Types::Sequence as u64)
            .and_then(|t| t.expect_constructed())
            .ok_or_else(|| LdapError::Decoding("LDAPMessage envelope is not a SEQUENCE".into()))?;

        if tags.len() < 2 {
            return Err(LdapError::Decoding("LDAPMessage has too few elements".into()));
        }

        let maybe_controls = tags.pop().expect("at least two elements");
        let has_controls = matches!(
            maybe_controls,
            StructureTag {
                class: TagClass::Context,
                id: 0,
                ..
            }
        );
        let (protoop, controls_tag) = if has_controls {
            let protoop = tags
                .pop()
                .ok_or_else(|| LdapError::Decoding("missing protocolOp".into()))?;
            (protoop, Some(maybe_controls))
        } else {
            (maybe_controls, None)
        };

        let id_tag = tags
            .pop()
            .ok_or_else(|| LdapError::Decoding("missing messageID".into()))?;
        let id = id_tag
            .match_class(TagClass::Universal)
            .and_then(|t| t.match_id(Types::Integer as u64))
            .and_then(|t| t.expect_primitive())
            .map(|bytes| Integer::from_struct_bytes(&bytes) as RequestId)
            .ok_or_else(|| LdapError::Decoding("malformed messageID".into()))?;

        let controls = match controls_tag {
            Some(t) => {
                let children = t.expect_constructed().unwrap_or_default();
                parse_controls(children)
            }
            None => Vec::new(),
        };

        Ok(Some((id, protoop, controls)))
    }
}

/// An outgoing request: its message ID, the protocol op itself, and any
/// request controls to attach.
pub(crate) type OutMessage = (RequestId, StructureTag, Option<Vec<StructureTag>>);

impl Encoder<OutMessage> for LdapCodec {
    type Error = LdapError;

    fn encode(&mut self, msg: OutMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (id, protoop, controls) = msg;
        let mut inner = vec![
            Tag::Integer(Integer {
                inner: id as i64,
                ..Default::default()
            }),
            Tag::StructureTag(protoop),
        ];
        if let Some(ctrls) = controls {
            if !ctrls.is_empty() {
                inner.push(Tag::StructureTag(StructureTag {
                    class: TagClass::Context,
                    id: 0,
                    payload: PL::C(ctrls),
                }));
            }
        }
        let envelope = Tag::Sequence(Sequence {
            inner,
            ..Default::default()
        });
        let mut out = Vec::new();
        write_tag(&mut out, &envelope.into_structure());
        dst.extend_from_slice(&out);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ber_codec::structures::Null;

    #[test]
    fn roundtrips_unbind() {
        let mut codec = LdapCodec::default();
        let mut buf = BytesMut::new();
        let unbind = Tag::Null(Null {
            id: 2,
            class: TagClass::Application,
            inner: (),
        })
        .into_structure();
        codec.encode((7, unbind.clone(), None), &mut buf).unwrap();
        let (id, op, ctrls) = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(id, 7);
        assert_eq!(op, unbind);
        assert!(ctrls.is_empty());
        assert!(buf.is_empty());
    }

    #[test]
    fn partial_frame_yields_none() {
        let mut codec = LdapCodec::default();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0x30, 0x10, 0x02, 0x01]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn oversized_message_is_rejected() {
        let mut codec = LdapCodec { max_message_size: 4 };
        let mut buf = BytesMut::new();
        let unbind = Tag::Null(Null {
            id: 2,
            class: TagClass::Application,
            inner: (),
        })
        .into_structure();
        let mut full_codec = LdapCodec::default();
        full_codec.encode((7, unbind, None), &mut buf).unwrap();
        assert!(codec.decode(&mut buf).is_err());
    }
}
