//! The Extended operation (RFC 4511 section 4.12): a generic carrier for
//! protocol extensions, identified by OID and carrying an optional opaque
//! value in both directions.

use ber_codec::common::TagClass;
use ber_codec::structures::{ASNTag, Sequence, Tag};

use crate::exop::Exop;
use crate::exop_impl::construct_exop;
use crate::ldap::Ldap;
use crate::result::{parse_ldap_result, ExopResult, LdapError, Result};

impl Ldap {
    /// Issue an Extended operation request built from `exop`, returning the
    /// response exop (if the server sent a `responseName`/`responseValue`)
    /// alongside the overall result.
    pub async fn extended<E: Into<Exop>>(&mut self, exop: E) -> Result<ExopResult> {
        let req = Tag::Sequence(Sequence {
            id: 23,
            class: TagClass::Application,
            inner: construct_exop(exop.into()),
        });

        let (resp_tag, ctrls) = self.single_op(req).await?;
        let mut tags = resp_tag
            .expect_constructed()
            .ok_or_else(|| LdapError::Decoding("ExtendedResponse is not a SEQUENCE".into()))?;

        let mut resp_name = None;
        let mut resp_val = None;
        while let Some(last) = tags.last() {
            if last.class != TagClass::Context {
                break;
            }
            match last.id {
                11 => resp_val = tags.pop().and_then(|t| t.expect_primitive()),
                10 => {
                    resp_name = tags
                        .pop()
                        .and_then(|t| t.expect_primitive())
                        .map(|b| String::from_utf8_lossy(&b).into_owned())
                }
                _ => break,
            }
        }

        let mut result = parse_ldap_result(&mut tags);
        result.ctrls = ctrls;
        Ok(ExopResult(
            Exop {
                name: resp_name,
                val: resp_val,
            },
            result,
        ))
    }
}
