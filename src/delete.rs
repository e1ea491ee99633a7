//! The Delete operation (RFC 4511 section 4.8): removes a leaf entry.

use ber_codec::common::TagClass;
use ber_codec::structures::{OctetString, Tag};

use crate::ldap::Ldap;
use crate::result::{LdapResult, Result};

impl Ldap {
    /// Delete the leaf entry named by `dn`.
    pub async fn delete<S: AsRef<str>>(&mut self, dn: S) -> Result<LdapResult> {
        let req = Tag::OctetString(OctetString {
            id: 10,
            class: TagClass::Application,
            inner: Vec::from(dn.as_ref()),
        });

        self.single_op_result(req).await
    }
}
