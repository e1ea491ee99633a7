//! The Modify operation (RFC 4511 section 4.6): adds, deletes, replaces,
//! or increments (RFC 4525) attribute values on an existing entry.

use std::collections::HashSet;
use std::hash::Hash;

use ber_codec::common::TagClass;
use ber_codec::structures::{Enumerated, OctetString, Sequence, Set, Tag};

use crate::ldap::{Ldap, Mod};
use crate::result::{LdapError, LdapResult, Result};

impl Ldap {
    /// Apply `mods` to the entry named by `dn`, in order.
    pub async fn modify<S: AsRef<[u8]> + Eq + Hash>(&mut self, dn: &str, mods: Vec<Mod<S>>) -> Result<LdapResult> {
        let mut any_add_empty = false;
        let change_tags = mods
            .into_iter()
            .map(|m| {
                let (num, attr, set) = match m {
                    Mod::Add(attr, set) => {
                        if set.is_empty() {
                            any_add_empty = true;
                        }
                        (0, attr, set)
                    }
                    Mod::Delete(attr, set) => (1, attr, set),
                    Mod::Replace(attr, set) => (2, attr, set),
                    Mod::Increment(attr, val) => {
                        let mut set = HashSet::with_capacity(1);
                        set.insert(val);
                        (3, attr, set)
                    }
                };
                let op = Tag::Enumerated(Enumerated {
                    inner: num,
                    ..Default::default()
                });
                let modification = Tag::Sequence(Sequence {
                    inner: vec![
                        Tag::OctetString(OctetString {
                            inner: attr.into_bytes(),
                            ..Default::default()
                        }),
                        Tag::Set(Set {
                            inner: set
                                .into_iter()
                                .map(|val| {
                                    Tag::OctetString(OctetString {
                                        inner: val.as_ref().to_vec(),
                                        ..Default::default()
                                    })
                                })
                                .collect(),
                            ..Default::default()
                        }),
                    ],
                    ..Default::default()
                });
                Tag::Sequence(Sequence {
                    inner: vec![op, modification],
                    ..Default::default()
                })
            })
            .collect();

        if any_add_empty {
            return Err(LdapError::Encoding("empty value set for Add".into()));
        }

        let req = Tag::Sequence(Sequence {
            id: 6,
            class: TagClass::Application,
            inner: vec![
                Tag::OctetString(OctetString {
                    inner: Vec::from(dn.as_bytes()),
                    ..Default::default()
                }),
                Tag::Sequence(Sequence {
                    inner: change_tags,
                    ..Default::default()
                }),
            ],
        });

        self.single_op_result(req).await
    }
}
