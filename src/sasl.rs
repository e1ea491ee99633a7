//! GSSAPI SASL Bind (RFC 4752), backed by system Kerberos via `cross-krb5`.
//!
//! GSSAPI differs from the mechanisms [`Ldap::sasl_bind`] drives through
//! `rsasl`: once the Kerberos security context is established, RFC 4752
//! section 3.1 requires one further exchange to negotiate a SASL security
//! layer before the Bind can succeed. This implementation always replies
//! choosing "no security layer" (the `1` bit of the server's offered mask),
//! leaving confidentiality and integrity to the transport (`ldaps://` or
//! STARTTLS); it does not wrap subsequent traffic.

use cross_krb5::{ClientCtx, InitiateFlags, K5Ctx, Step};

use crate::bind::{bind_request, parse_bind_response, sasl_credentials};
use crate::ldap::Ldap;
use crate::result::{LdapError, LdapResult, Result};

/// No security layer, RFC 4752 section 3.3's `qop` bit 1.
const SASL_NO_SECURITY_LAYER: u8 = 0x01;

fn krb5_err(e: impl std::fmt::Display) -> LdapError {
    LdapError::Sasl(e.to_string())
}

impl Ldap {
    /// Perform a GSSAPI SASL Bind, authenticating as the identity in the
    /// default Kerberos credential cache against `target_principal`
    /// (typically `ldap/host.example.com@REALM`).
    pub async fn sasl_gssapi_bind(&mut self, target_principal: &str) -> Result<LdapResult> {
        let (mut ctx, first_token) = ClientCtx::new(InitiateFlags::empty(), None, target_principal, None)
            .map_err(krb5_err)?;

        let mut out_token = first_token;
        loop {
            let auth = sasl_credentials("GSSAPI", Some(&out_token));
            let (resp_tag, ctrls) = self.single_op(bind_request("", auth)).await?;
            let (result, server_creds) = parse_bind_response(resp_tag, ctrls)?;
            if result.rc != 14 {
                return Ok(result);
            }

            match ctx.step(server_creds.as_deref()).map_err(krb5_err)? {
                Step::Continue((next_ctx, token)) => {
                    ctx = next_ctx;
                    out_token = token;
                }
                Step::Finished((next_ctx, token)) => {
                    return self.sasl_gssapi_negotiate_security_layer(next_ctx, token).await;
                }
            }
        }
    }

    /// RFC 4752 section 3.1's final leg: the server wraps its supported
    /// security layer bitmask and maximum output size, we unwrap it, reply
    /// choosing "no security layer", and wait for the terminal response.
    async fn sasl_gssapi_negotiate_security_layer(
        &mut self,
        mut ctx: ClientCtx,
        finishing_token: Option<Vec<u8>>,
    ) -> Result<LdapResult> {
        if let Some(token) = finishing_token {
            let auth = sasl_credentials("GSSAPI", Some(&token));
            let (resp_tag, ctrls) = self.single_op(bind_request("", auth)).await?;
            let (result, server_creds) = parse_bind_response(resp_tag, ctrls)?;
            if result.rc != 14 {
                return Ok(result);
            }
            return self.sasl_gssapi_finish_layer(&mut ctx, server_creds).await;
        }

        let auth = sasl_credentials("GSSAPI", Some(&[]));
        let (resp_tag, ctrls) = self.single_op(bind_request("", auth)).await?;
        let (result, server_creds) = parse_bind_response(resp_tag, ctrls)?;
        if result.rc != 14 {
            return Ok(result);
        }
        self.sasl_gssapi_finish_layer(&mut ctx, server_creds).await
    }

    async fn sasl_gssapi_finish_layer(&mut self, ctx: &mut ClientCtx, server_creds: Option<Vec<u8>>) -> Result<LdapResult> {
        let wrapped = server_creds.ok_or_else(|| LdapError::Sasl("GSSAPI security layer message missing".into()))?;
        let layer_msg = ctx.unwrap(&wrapped).map_err(krb5_err)?;
        if layer_msg.len() < 4 {
            return Err(LdapError::Sasl("GSSAPI security layer message too short".into()));
        }
        if layer_msg[0] & SASL_NO_SECURITY_LAYER == 0 {
            return Err(LdapError::Sasl("server requires a GSSAPI security layer, which is unsupported".into()));
        }

        let reply = [SASL_NO_SECURITY_LAYER, 0, 0, 0];
        let out = ctx.wrap(false, &reply).map_err(krb5_err)?;
        let auth = sasl_credentials("GSSAPI", Some(&out));
        let (resp_tag, ctrls) = self.single_op(bind_request("", auth)).await?;
        let (result, _) = parse_bind_response(resp_tag, ctrls)?;
        Ok(result)
    }
}
