//! The Compare operation (RFC 4511 section 4.10): tests whether an entry
//! has a given attribute value.

use ber_codec::common::TagClass;
use ber_codec::structures::{OctetString, Sequence, Tag};

use crate::ldap::Ldap;
use crate::result::{CompareResult, Result};

impl Ldap {
    /// Compare `val` against the values of `attr` on the entry named by `dn`.
    pub async fn compare<B: AsRef<[u8]>>(&mut self, dn: &str, attr: &str, val: B) -> Result<CompareResult> {
        let req = Tag::Sequence(Sequence {
            id: 14,
            class: TagClass::Application,
            inner: vec![
                Tag::OctetString(OctetString {
                    inner: Vec::from(dn.as_bytes()),
                    ..Default::default()
                }),
                Tag::Sequence(Sequence {
                    inner: vec![
                        Tag::OctetString(OctetString {
                            inner: Vec::from(attr.as_bytes()),
                            ..Default::default()
                        }),
                        Tag::OctetString(OctetString {
                            inner: Vec::from(val.as_ref()),
                            ..Default::default()
                        }),
                    ],
                    ..Default::default()
                }),
            ],
        });

        self.single_op_result(req).await.map(CompareResult)
    }
}
