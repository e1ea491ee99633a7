//! The Add operation (RFC 4511 section 4.7): creates a new entry.

use std::collections::HashSet;
use std::hash::Hash;

use ber_codec::common::TagClass;
use ber_codec::structures::{OctetString, Sequence, Set, Tag};

use crate::ldap::Ldap;
use crate::result::{LdapError, LdapResult, Result};

impl Ldap {
    /// Add a new entry with the given DN and attributes. Each attribute's
    /// value set must be non-empty.
    pub async fn add<S: AsRef<str> + Eq + Hash>(&mut self, dn: &str, attrs: Vec<(S, HashSet<S>)>) -> Result<LdapResult> {
        if attrs.iter().any(|(_, vals)| vals.is_empty()) {
            return Err(LdapError::Encoding("empty value set for Add".into()));
        }
        let req = Tag::Sequence(Sequence {
            id: 8,
            class: TagClass::Application,
            inner: vec![
                Tag::OctetString(OctetString {
                    inner: Vec::from(dn.as_bytes()),
                    ..Default::default()
                }),
                Tag::Sequence(Sequence {
                    inner: attrs
                        .into_iter()
                        .map(|(name, vals)| {
                            Tag::Sequence(Sequence {
                                inner: vec![
                                    Tag::OctetString(OctetString {
                                        inner: Vec::from(name.as_ref()),
                                        ..Default::default()
                                    }),
                                    Tag::Set(Set {
                                        inner: vals
                                            .into_iter()
                                            .map(|v| {
                                                Tag::OctetString(OctetString {
                                                    inner: Vec::from(v.as_ref()),
                                                    ..Default::default()
                                                })
                                            })
                                            .collect(),
                                        ..Default::default()
                                    }),
                                ],
                                ..Default::default()
                            })
                        })
                        .collect(),
                    ..Default::default()
                }),
            ],
        });

        self.single_op_result(req).await
    }
}
