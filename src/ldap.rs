//! The `Ldap` handle: a cheaply-cloned, request-dispatching front end for
//! a single connection. Every operation method builds a protocol op,
//! hands it to the background connection driver over a channel, and
//! awaits the matching response.

use std::fmt;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use ber_codec::structure::StructureTag;
use ber_codec::structures::{ASNTag, Tag};

use crate::controls::Control;
use crate::referral::ReferralConnector;
use crate::result::{LdapError, LdapResult, Result};
use crate::search::SearchOptions;

/// A single attribute modification within a Modify request (RFC 4511
/// section 4.6): add values to, delete values (or the whole attribute)
/// from, or replace the values of an attribute.
#[derive(Clone, Debug)]
pub enum Mod<S: AsRef<[u8]> + Eq + std::hash::Hash> {
    /// Add the given values to the attribute, creating it if absent.
    Add(String, std::collections::HashSet<S>),
    /// Delete the given values from the attribute, or the whole attribute
    /// if the set is empty.
    Delete(String, std::collections::HashSet<S>),
    /// Replace the attribute's values with the given set, or remove the
    /// attribute entirely if the set is empty.
    Replace(String, std::collections::HashSet<S>),
    /// Increment the attribute's (single, numeric) value by the given
    /// amount (RFC 4525).
    Increment(String, S),
}

/// An LDAP message ID, scoped to a single connection.
pub type RequestId = i32;

/// The dispatch kind for an outgoing protocol op, distinguishing how many
/// responses the driver should expect to route back.
pub(crate) enum LdapOp {
    /// Exactly one response PDU is expected (Bind, Add, Delete, Modify,
    /// ModifyDN, Compare, Extended).
    Single(oneshot::Sender<Result<(StructureTag, Vec<Control>)>>),
    /// Zero or more entries/references followed by one SearchResultDone.
    Multi(mpsc::UnboundedSender<(StructureTag, Vec<Control>)>),
    /// No response is expected at all (Unbind, Abandon).
    Solo,
}

pub(crate) struct Request {
    pub(crate) id: RequestId,
    pub(crate) tag: StructureTag,
    pub(crate) controls: Option<Vec<StructureTag>>,
    pub(crate) op: LdapOp,
    /// A message ID whose acceptor the driver should drop from its
    /// registry before putting this request on the wire. Set only by
    /// [`Ldap::abandon_msgid`]: the wire AbandonRequest is informational
    /// (the server isn't obliged to honor it), but the local contract is
    /// that no response will reach the caller after abandon, so the
    /// acceptor has to go regardless of what the server does.
    pub(crate) deregister: Option<RequestId>,
}

/// Handle for LDAP operations on a connection established by
/// [`LdapConnAsync::new()`](crate::conn::LdapConnAsync::new).
///
/// All LDAP operations allow attaching a series of request controls, which
/// augment or modify the operation. Controls are attached by calling
/// [`with_controls()`](Self::with_controls) on the handle, and using the
/// result to invoke the operation. A timeout can be imposed on an operation
/// by calling [`with_timeout()`](Self::with_timeout) beforehand.
///
/// The Search operation has many parameters, most of which are infrequently
/// used; those can be set via [`with_search_options()`](Self::with_search_options).
///
/// `Ldap` is `Clone`; cloning shares the same underlying connection and
/// message-ID counter, so independent operations issued from clones
/// interleave safely on the wire.
#[derive(Clone)]
pub struct Ldap {
    pub(crate) tx: mpsc::UnboundedSender<Request>,
    next_id: Arc<AtomicI32>,
    /// Timeout for the next operation invoked on this handle.
    pub timeout: Option<Duration>,
    /// Search parameters for the next Search operation invoked on this handle.
    pub search_opts: Option<SearchOptions>,
    /// Request controls for the next operation invoked on this handle.
    pub controls: Option<Vec<Control>>,
    /// Referral chasing policy, if enabled: the connector used to reach a
    /// referred-to server, and the maximum number of hops to follow.
    pub(crate) referral: Option<(Arc<dyn ReferralConnector>, u32)>,
    /// Connection-wide default response timeout, used when an operation
    /// doesn't set its own via [`with_timeout`](Self::with_timeout).
    pub(crate) default_timeout: Option<Duration>,
}

impl fmt::Debug for Ldap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ldap").finish_non_exhaustive()
    }
}

impl Ldap {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Request>, next_id: Arc<AtomicI32>) -> Self {
        Ldap {
            tx,
            next_id,
            timeout: None,
            search_opts: None,
            controls: None,
            referral: None,
            default_timeout: None,
        }
    }

    /// Enable referral chasing on this handle (and any handles cloned from
    /// it afterwards): an operation response whose result code is
    /// `referral` is automatically retried against the URL(s) it names,
    /// using `connector` to reach each referred-to server, up to
    /// `hop_limit` total hops.
    pub fn with_referral_chasing(&mut self, connector: Arc<dyn ReferralConnector>, hop_limit: u32) -> &mut Self {
        self.referral = Some((connector, hop_limit));
        self
    }

    /// Allocate the next message ID. RFC 4511 doesn't reserve any value,
    /// but id 0 is conventionally used for unsolicited notifications, so
    /// wraparound skips it; it also skips any id presently awaiting a
    /// response, which can only happen after `i32::MAX` concurrent
    /// outstanding operations on one connection.
    pub(crate) fn next_msgid(&self) -> RequestId {
        loop {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return id;
            }
        }
    }

    /// Use the given controls with the next operation invoked on this handle.
    pub fn with_controls(&mut self, ctrls: Vec<Control>) -> &mut Self {
        self.controls = Some(ctrls);
        self
    }

    /// Use the given timeout with the next operation invoked on this handle.
    pub fn with_timeout(&mut self, duration: Duration) -> &mut Self {
        self.timeout = Some(duration);
        self
    }

    /// Use the given search options with the next Search operation invoked
    /// on this handle.
    pub fn with_search_options(&mut self, opts: SearchOptions) -> &mut Self {
        self.search_opts = Some(opts);
        self
    }

    pub(crate) fn take_req_controls(&mut self) -> Option<Vec<StructureTag>> {
        self.controls
            .take()
            .map(|ctrls| ctrls.into_iter().map(StructureTag::from).collect())
    }

    /// Send a request expecting a single response PDU, and await it,
    /// honoring any timeout set on this handle.
    pub(crate) async fn single_op(&mut self, tag: Tag) -> Result<(StructureTag, Vec<Control>)> {
        self.single_op_structure(tag.into_structure()).await
    }

    async fn single_op_structure(&mut self, structure: StructureTag) -> Result<(StructureTag, Vec<Control>)> {
        let id = self.next_msgid();
        let controls = self.take_req_controls();
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Request {
                id,
                tag: structure,
                controls,
                op: LdapOp::Single(tx),
                deregister: None,
            })
            .map_err(|_| LdapError::ConnectionClosed)?;
        let recv = async { rx.await.map_err(|_| LdapError::ConnectionClosed)? };
        match self.timeout.take().or(self.default_timeout) {
            Some(d) => match tokio::time::timeout(d, recv).await {
                Ok(res) => res,
                Err(_) => {
                    let _ = self.abandon_msgid(id);
                    Err(LdapError::Timeout)
                }
            },
            None => recv.await,
        }
    }

    /// Send a request expecting a single LDAPResult-bearing response PDU,
    /// parse the result, and — if referral chasing is enabled on this
    /// handle and the result code is `referral` — chase it: resend an
    /// identical copy of `tag` and the request's controls to each
    /// referred-to server in turn, returning the first one that succeeds
    /// without itself being a referral. If chasing is disabled, fails for
    /// every URL, or exceeds the hop limit, the original referral result
    /// is returned unchanged.
    pub(crate) async fn single_op_result(&mut self, tag: Tag) -> Result<LdapResult> {
        let structure = tag.into_structure();
        let saved_controls = self.controls.clone();
        let (resp_tag, ctrls) = self.single_op_structure(structure.clone()).await?;
        let mut result = parse_single_result(resp_tag)?;
        result.ctrls = ctrls;

        if result.rc == 10 {
            if let Some((connector, hop_limit)) = self.referral.clone() {
                let mut reissue = move |mut ldap: Ldap, _url: &crate::referral::LdapUrl| {
                    let structure = structure.clone();
                    let controls = saved_controls.clone();
                    async move {
                        ldap.controls = controls;
                        let (resp_tag, ctrls) = ldap.single_op_structure(structure).await?;
                        let mut r = parse_single_result(resp_tag)?;
                        r.ctrls = ctrls;
                        Ok(r)
                    }
                };
                let refs = result.refs.clone();
                if let Some(r) = crate::referral::chase(&refs, 0, hop_limit, connector.as_ref(), &mut reissue).await? {
                    return Ok(r);
                }
            }
        }
        Ok(result)
    }

    /// Send a request with no response expected.
    pub(crate) fn solo_op(&mut self, tag: Tag) -> Result<()> {
        self.solo_op_deregistering(tag, None)
    }

    /// Like [`solo_op`](Self::solo_op), additionally telling the driver to
    /// drop `deregister`'s acceptor (if any) from its registry before this
    /// request goes on the wire.
    fn solo_op_deregistering(&mut self, tag: Tag, deregister: Option<RequestId>) -> Result<()> {
        let id = self.next_msgid();
        let controls = self.take_req_controls();
        self.tx
            .send(Request {
                id,
                tag: tag.into_structure(),
                controls,
                op: LdapOp::Solo,
                deregister,
            })
            .map_err(|_| LdapError::ConnectionClosed)
    }

    /// Send a Search request, registering an unbounded channel for the
    /// stream of entries/references/done that will follow.
    pub(crate) fn search_op(
        &mut self,
        tag: Tag,
    ) -> Result<(RequestId, mpsc::UnboundedReceiver<(StructureTag, Vec<Control>)>)> {
        let id = self.next_msgid();
        let controls = self.take_req_controls();
        let (tx, rx) = mpsc::unbounded_channel();
        self.tx
            .send(Request {
                id,
                tag: tag.into_structure(),
                controls,
                op: LdapOp::Multi(tx),
                deregister: None,
            })
            .map_err(|_| LdapError::ConnectionClosed)?;
        Ok((id, rx))
    }

    /// Send an Abandon request for `id` and deregister its acceptor.
    /// Abandon itself has no response; deregistering locally, rather than
    /// waiting on the server, is what makes the operation's effect
    /// immediate and idempotent — a second abandon for the same ID finds
    /// nothing left to remove and is a no-op beyond resending the wire PDU.
    pub(crate) fn abandon_msgid(&mut self, id: RequestId) -> Result<()> {
        let abandon = Tag::Integer(ber_codec::structures::Integer {
            id: 16,
            class: ber_codec::common::TagClass::Application,
            inner: id as i64,
        });
        self.solo_op_deregistering(abandon, Some(id))
    }
}

/// Parse a response PDU that carries nothing beyond the common LDAPResult
/// sequence (Add, Delete, Modify, ModifyDN done responses).
fn parse_single_result(tag: StructureTag) -> Result<LdapResult> {
    let mut tags = tag
        .expect_constructed()
        .ok_or_else(|| LdapError::Decoding("response is not a SEQUENCE".into()))?;
    Ok(crate::result::parse_ldap_result(&mut tags))
}
