//! The Bind operation (RFC 4511 section 4.2): simple, SASL EXTERNAL, and
//! generic SASL authentication.

use std::sync::Arc;

use ber_codec::common::TagClass;
use ber_codec::structure::StructureTag;
use ber_codec::structures::{ASNTag, Integer, OctetString, Sequence, Tag};

use rsasl::mechname::Mechname;
use rsasl::prelude::{SASLClient, SASLConfig, State};

use crate::controls::Control;
use crate::ldap::Ldap;
use crate::result::{LdapError, LdapResult, Result};

const LDAP_VERSION: i64 = 3;

pub(crate) fn bind_request(name: &str, auth: Tag) -> Tag {
    Tag::Sequence(Sequence {
        id: 0,
        class: TagClass::Application,
        inner: vec![
            Tag::Integer(Integer {
                inner: LDAP_VERSION,
                ..Default::default()
            }),
            Tag::OctetString(OctetString {
                inner: Vec::from(name),
                ..Default::default()
            }),
            auth,
        ],
    })
}

pub(crate) fn sasl_credentials(mechanism: &str, credentials: Option<&[u8]>) -> Tag {
    let mut inner = vec![Tag::OctetString(OctetString {
        inner: Vec::from(mechanism),
        ..Default::default()
    })];
    if let Some(c) = credentials {
        inner.push(Tag::OctetString(OctetString {
            inner: c.to_vec(),
            ..Default::default()
        }));
    }
    Tag::Sequence(Sequence {
        id: 3,
        class: TagClass::Context,
        inner,
    })
}

/// Split a decoded BindResponse into its `LdapResult` and an optional
/// `serverSaslCreds` ([7] context-tagged octet string).
pub(crate) fn parse_bind_response(
    resp_tag: StructureTag,
    ctrls: Vec<Control>,
) -> Result<(LdapResult, Option<Vec<u8>>)> {
    let mut tags = resp_tag
        .expect_constructed()
        .ok_or_else(|| LdapError::Decoding("BindResponse is not a SEQUENCE".into()))?;
    let server_sasl_creds = match tags.last() {
        Some(t) if t.class == TagClass::Context && t.id == 7 => tags.pop().and_then(|t| t.expect_primitive()),
        _ => None,
    };
    let mut result = crate::result::parse_ldap_result(&mut tags);
    result.ctrls = ctrls;
    Ok((result, server_sasl_creds))
}

impl Ldap {
    /// Perform a simple Bind with the given DN and password.
    pub async fn simple_bind(&mut self, bind_dn: &str, bind_pw: &str) -> Result<LdapResult> {
        let auth = Tag::OctetString(OctetString {
            id: 0,
            class: TagClass::Context,
            inner: Vec::from(bind_pw),
        });
        self.single_op_result(bind_request(bind_dn, auth)).await
    }

    /// Perform a SASL EXTERNAL Bind, authenticating with the identity
    /// already established by the transport (a client TLS certificate, or
    /// the peer credentials of a Unix domain socket).
    pub async fn sasl_external_bind(&mut self) -> Result<LdapResult> {
        let auth = sasl_credentials("EXTERNAL", None);
        self.single_op_result(bind_request("", auth)).await
    }

    /// Perform a SASL Bind, driving `mechanism` via `config` through as
    /// many intermediate `saslBindInProgress` exchanges as it requires.
    pub async fn sasl_bind(&mut self, mechanism: &Mechname, config: Arc<SASLConfig>) -> Result<LdapResult> {
        let sasl = SASLClient::new(config);
        let mut session = sasl
            .start_suggested([mechanism])
            .map_err(|e| LdapError::Sasl(e.to_string()))?;

        let mut server_creds: Option<Vec<u8>> = None;
        loop {
            let mut out = Vec::new();
            let state = session
                .step(server_creds.as_deref(), &mut out)
                .map_err(|e| LdapError::Sasl(e.to_string()))?;

            let auth = sasl_credentials(mechanism.as_str(), Some(&out));
            let (resp_tag, ctrls) = self.single_op(bind_request("", auth)).await?;
            let (result, server_sasl_creds) = parse_bind_response(resp_tag, ctrls)?;

            if state == State::Finished || result.rc != 14 {
                return Ok(result);
            }
            server_creds = server_sasl_creds;
        }
    }
}
