//! The Modify DN operation (RFC 4511 section 4.9): renames an entry and/or
//! moves it to a new superior.

use ber_codec::common::TagClass;
use ber_codec::structures::{Boolean, OctetString, Sequence, Tag};

use crate::dn::Dn;
use crate::ldap::Ldap;
use crate::result::{LdapError, LdapResult, Result};

impl Ldap {
    /// Rename/move the entry named by `dn`: `new_rdn` becomes its new
    /// relative name, `delete_old` controls whether the old RDN's values
    /// are removed from the entry, and `new_sup`, if given, moves the
    /// entry under a different superior. `new_sup` is omitted from the
    /// wire request entirely when absent, never encoded as an empty string.
    pub async fn modifydn(
        &mut self,
        dn: &str,
        new_rdn: &str,
        delete_old: bool,
        new_sup: Option<&str>,
    ) -> Result<LdapResult> {
        let rdn = Dn::parse(new_rdn)?;
        if rdn.rdns.len() != 1 {
            return Err(LdapError::Encoding(format!(
                "new RDN must be exactly one RDN component: {new_rdn:?}"
            )));
        }

        let mut params = vec![
            Tag::OctetString(OctetString {
                inner: Vec::from(dn.as_bytes()),
                ..Default::default()
            }),
            Tag::OctetString(OctetString {
                inner: Vec::from(new_rdn.as_bytes()),
                ..Default::default()
            }),
            Tag::Boolean(Boolean {
                inner: delete_old,
                ..Default::default()
            }),
        ];
        if let Some(new_sup) = new_sup {
            params.push(Tag::OctetString(OctetString {
                id: 0,
                class: TagClass::Context,
                inner: Vec::from(new_sup.as_bytes()),
            }));
        }
        let req = Tag::Sequence(Sequence {
            id: 12,
            class: TagClass::Application,
            inner: params,
        });

        self.single_op_result(req).await
    }
}
