//! A synchronous facade over [`Ldap`], for callers that would rather block
//! than drive a `Future`. [`LdapConn`] owns a single-threaded Tokio runtime
//! and the connection's driver task; every method blocks the calling
//! thread until its operation completes.
//!
//! Per spec, this mode is only safe when the caller serializes operations
//! on one `LdapConn` — concurrent calls from multiple threads on the same
//! handle would race on the shared runtime.

use std::collections::HashSet;
use std::hash::Hash;

use tokio::runtime::{self, Runtime};

use crate::conn::{LdapConnAsync, LdapConnSettings};
use crate::exop::Exop;
use crate::ldap::{Ldap, Mod, RequestId};
use crate::result::{CompareResult, ExopResult, LdapResult, Result};
use crate::search::{ResultEntry, Scope};

/// Synchronous LDAP connection handle. Construction resolves and connects
/// to `url` immediately; every operation method blocks until it completes.
pub struct LdapConn {
    ldap: Ldap,
    rt: Runtime,
}

impl LdapConn {
    /// Connect to `url` with default settings.
    pub fn new(url: &str) -> Result<Self> {
        Self::with_settings(LdapConnSettings::new(), url)
    }

    /// Connect to `url` with explicit [`LdapConnSettings`].
    pub fn with_settings(settings: LdapConnSettings, url: &str) -> Result<Self> {
        let rt = runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let ldap = rt.block_on(async move {
            let (conn, ldap) = LdapConnAsync::with_settings(settings, url).await?;
            super::drive!(conn);
            Ok::<_, crate::result::LdapError>(ldap)
        })?;
        Ok(LdapConn { ldap, rt })
    }

    /// Expose the underlying async handle, e.g. to pass to a function
    /// written against `&mut Ldap`.
    pub fn ldap_handle(&mut self) -> &mut Ldap {
        &mut self.ldap
    }

    pub fn simple_bind(&mut self, bind_dn: &str, bind_pw: &str) -> Result<LdapResult> {
        let (rt, ldap) = (&mut self.rt, &mut self.ldap);
        rt.block_on(async move { ldap.simple_bind(bind_dn, bind_pw).await })
    }

    pub fn sasl_external_bind(&mut self) -> Result<LdapResult> {
        let (rt, ldap) = (&mut self.rt, &mut self.ldap);
        rt.block_on(async move { ldap.sasl_external_bind().await })
    }

    pub fn search<S, A>(&mut self, base: &str, scope: Scope, filter: &str, attrs: A) -> Result<(Vec<ResultEntry>, LdapResult)>
    where
        S: AsRef<str> + Send + Sync,
        A: AsRef<[S]> + Send + Sync,
    {
        let (rt, ldap) = (&mut self.rt, &mut self.ldap);
        rt.block_on(async move { ldap.search(base, scope, filter, attrs).await })
    }

    pub fn add<S: AsRef<str> + Eq + Hash>(&mut self, dn: &str, attrs: Vec<(S, HashSet<S>)>) -> Result<LdapResult> {
        let (rt, ldap) = (&mut self.rt, &mut self.ldap);
        rt.block_on(async move { ldap.add(dn, attrs).await })
    }

    pub fn delete<S: AsRef<str>>(&mut self, dn: S) -> Result<LdapResult> {
        let (rt, ldap) = (&mut self.rt, &mut self.ldap);
        rt.block_on(async move { ldap.delete(dn).await })
    }

    pub fn modify<S: AsRef<[u8]> + Eq + Hash>(&mut self, dn: &str, mods: Vec<Mod<S>>) -> Result<LdapResult> {
        let (rt, ldap) = (&mut self.rt, &mut self.ldap);
        rt.block_on(async move { ldap.modify(dn, mods).await })
    }

    pub fn modifydn(&mut self, dn: &str, new_rdn: &str, delete_old: bool, new_sup: Option<&str>) -> Result<LdapResult> {
        let (rt, ldap) = (&mut self.rt, &mut self.ldap);
        rt.block_on(async move { ldap.modifydn(dn, new_rdn, delete_old, new_sup).await })
    }

    pub fn compare<B: AsRef<[u8]>>(&mut self, dn: &str, attr: &str, val: B) -> Result<CompareResult> {
        let (rt, ldap) = (&mut self.rt, &mut self.ldap);
        rt.block_on(async move { ldap.compare(dn, attr, val).await })
    }

    pub fn extended<E: Into<Exop>>(&mut self, exop: E) -> Result<ExopResult> {
        let (rt, ldap) = (&mut self.rt, &mut self.ldap);
        rt.block_on(async move { ldap.extended(exop).await })
    }

    /// Abandon the operation identified by `msgid`. Does not block, since
    /// Abandon has no response to wait for.
    pub fn abandon(&mut self, msgid: RequestId) -> Result<()> {
        self.ldap.abandon(msgid)
    }

    /// Send an UnbindRequest. Does not block.
    pub fn unbind(&mut self) -> Result<()> {
        self.ldap.unbind()
    }
}
