//! Connection setup and the background driver task.
//!
//! [`LdapConnAsync::new()`] resolves a URL, opens the transport (TCP,
//! `ldapi://` Unix domain socket, or TLS), and returns a pair: the
//! connection itself — which must be polled to completion, normally by
//! spawning it with [`drive!`](crate::drive) — and an [`Ldap`] handle for
//! issuing operations. Everything between "bytes off the wire" and
//! "response delivered to the right caller" happens in
//! [`LdapConnAsync::drive()`].

use std::collections::HashMap;
use std::sync::atomic::AtomicI32;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use url::Url;

use ber_codec::common::TagClass;
use ber_codec::structure::StructureTag;
use ber_codec::structures::{ASNTag, Tag};

use crate::controls::Control;
use crate::exop_impl::{construct_exop, StartTls};
use crate::ldap::{LdapOp, Ldap, Request, RequestId};
use crate::protocol::{LdapCodec, DEFAULT_MAX_MESSAGE_SIZE};
use crate::referral;
use crate::result::{parse_ldap_result, LdapError, Result};
use crate::tls::{BoxedStream, PinnedStream};

/// Settings governing how [`LdapConnAsync::new()`]/[`LdapConnAsync::with_settings()`]
/// establish the connection, and the defaults the resulting [`Ldap`] handle
/// carries into every operation.
#[derive(Clone, Debug)]
pub struct LdapConnSettings {
    conn_timeout: Option<Duration>,
    no_tls_verify: bool,
    starttls: bool,
    response_timeout: Option<Duration>,
    max_message_size: u32,
    follow_referrals: bool,
    referral_hop_limit: u32,
}

impl Default for LdapConnSettings {
    fn default() -> Self {
        LdapConnSettings {
            conn_timeout: None,
            no_tls_verify: false,
            starttls: false,
            response_timeout: None,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            follow_referrals: false,
            referral_hop_limit: referral::DEFAULT_REFERRAL_HOP_LIMIT,
        }
    }
}

impl LdapConnSettings {
    /// Construct a settings instance with library defaults: no connect
    /// timeout, full certificate verification, no StartTLS, referral
    /// chasing disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the TCP connect timeout. Ignored for Unix domain socket connections.
    pub fn set_conn_timeout(mut self, timeout: Duration) -> Self {
        self.conn_timeout = Some(timeout);
        self
    }

    /// Disable TLS certificate/hostname verification. Only affects `ldaps://`
    /// and StartTLS connections; has no effect otherwise.
    pub fn set_no_tls_verify(mut self, no_tls_verify: bool) -> Self {
        self.no_tls_verify = no_tls_verify;
        self
    }

    /// Use the StartTLS extended operation to upgrade a plain `ldap://`
    /// connection to TLS immediately after the TCP handshake, before any
    /// other operation is sent.
    pub fn set_starttls(mut self, starttls: bool) -> Self {
        self.starttls = starttls;
        self
    }

    /// Set the default per-operation response timeout, used whenever an
    /// operation's `Ldap` handle doesn't have a more specific one set via
    /// [`Ldap::with_timeout`](crate::Ldap::with_timeout).
    pub fn set_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = Some(timeout);
        self
    }

    /// Cap the size of a single decoded `LDAPMessage`. Protects against a
    /// peer declaring an unreasonably large length prefix.
    pub fn set_max_message_size(mut self, max: u32) -> Self {
        self.max_message_size = max;
        self
    }

    /// Automatically chase referrals using the default connector (a plain,
    /// unauthenticated reconnect to each referred-to server), up to
    /// `hop_limit` hops.
    pub fn set_follow_referrals(mut self, hop_limit: u32) -> Self {
        self.follow_referrals = true;
        self.referral_hop_limit = hop_limit;
        self
    }
}

enum PendingOp {
    Single(tokio::sync::oneshot::Sender<Result<(StructureTag, Vec<Control>)>>),
    Multi(mpsc::UnboundedSender<(StructureTag, Vec<Control>)>),
}

/// The connection driver. Implements the request/response multiplexing
/// loop; must be polled to completion for the connection to make
/// progress. See [`drive!`](crate::drive).
pub struct LdapConnAsync {
    framed: Framed<PinnedStream, LdapCodec>,
    rx: mpsc::UnboundedReceiver<Request>,
    pending: HashMap<RequestId, PendingOp>,
}

impl LdapConnAsync {
    /// Open a connection to an LDAP server specified by `url`. The scheme
    /// (`ldap`, `ldaps`, or on Unix, `ldapi`), host, and port are taken
    /// from the URL; an `ldapi://` URL carries a percent-encoded Unix
    /// domain socket path in place of the host.
    ///
    /// Returns a pair: a connection that must be driven (see
    /// [`drive!`](crate::drive)) and a handle for issuing operations on it.
    pub async fn new(url: &str) -> Result<(LdapConnAsync, Ldap)> {
        Self::with_settings(LdapConnSettings::new(), url).await
    }

    /// Like [`new()`](Self::new), with explicit [`LdapConnSettings`].
    pub async fn with_settings(settings: LdapConnSettings, url: &str) -> Result<(LdapConnAsync, Ldap)> {
        let parsed = Url::parse(url)?;

        #[cfg(unix)]
        if parsed.scheme() == "ldapi" {
            return Self::new_unix(&settings, url).await;
        }

        Self::new_tcp(&parsed, &settings).await
    }

    #[cfg(unix)]
    async fn new_unix(settings: &LdapConnSettings, url: &str) -> Result<(LdapConnAsync, Ldap)> {
        use percent_encoding::percent_decode_str;
        use tokio::net::UnixStream;

        let path = url.strip_prefix("ldapi://").unwrap_or("");
        if path.is_empty() {
            return Err(LdapError::EmptyUnixPath);
        }
        let path = percent_decode_str(path).decode_utf8_lossy().into_owned();
        let stream = UnixStream::connect(&path).await?;
        Ok(Self::from_stream(Box::pin(stream), settings))
    }

    async fn new_tcp(parsed: &Url, settings: &LdapConnSettings) -> Result<(LdapConnAsync, Ldap)> {
        let mut port = 389;
        let scheme = parsed.scheme();
        let use_tls = match scheme {
            "ldap" => false,
            "ldaps" => {
                port = 636;
                true
            }
            other => return Err(LdapError::UnimplementedScheme(other.to_owned())),
        };
        if let Some(p) = parsed.port() {
            port = p;
        }
        let host = parsed.host_str().unwrap_or("localhost").to_owned();
        let host_port = format!("{host}:{port}");

        let connect = TcpStream::connect(&host_port);
        let tcp = match settings.conn_timeout {
            Some(d) => tokio::time::timeout(d, connect)
                .await
                .map_err(|_| LdapError::Timeout)??,
            None => connect.await?,
        };

        if use_tls {
            let tls = crate::tls::wrap_tls(tcp, &host, settings.no_tls_verify, None).await?;
            return Ok(Self::from_stream(Box::pin(tls), settings));
        }

        if settings.starttls {
            let upgraded = Self::starttls(tcp, &host, settings).await?;
            return Ok(Self::from_stream(upgraded, settings));
        }

        Ok(Self::from_stream(Box::pin(tcp), settings))
    }

    /// Issue the StartTLS extended operation on a freshly connected plain
    /// socket, then wrap the same socket in TLS. The LDAP framing is set
    /// up and torn down again around this single request/response, since
    /// StartTLS must happen before any other protocol traffic.
    async fn starttls(tcp: TcpStream, host: &str, settings: &LdapConnSettings) -> Result<BoxedStream> {
        let mut framed = Framed::new(tcp, LdapCodec::default());
        let exop = Tag::Sequence(ber_codec::structures::Sequence {
            id: 23,
            class: TagClass::Application,
            inner: construct_exop(StartTls.into()),
        });
        let id = 1;
        framed
            .send((id, exop.into_structure(), None))
            .await
            .map_err(|_| LdapError::ConnectionClosed)?;
        let (resp_id, resp_tag, _ctrls) = framed
            .next()
            .await
            .ok_or(LdapError::ConnectionClosed)??;
        if resp_id != id {
            return Err(LdapError::Decoding(
                "unexpected message ID in StartTLS response".into(),
            ));
        }
        let mut tags = resp_tag
            .expect_constructed()
            .ok_or_else(|| LdapError::Decoding("StartTLS response is not a SEQUENCE".into()))?;
        let result = parse_ldap_result(&mut tags);
        result.success().map_err(|_| {
            LdapError::Tls("server refused StartTLS".into())
        })?;
        let tcp = framed.into_inner();
        let tls = crate::tls::wrap_tls(tcp, host, settings.no_tls_verify, None).await?;
        Ok(Box::pin(tls))
    }

    fn from_stream(stream: BoxedStream, settings: &LdapConnSettings) -> (LdapConnAsync, Ldap) {
        let codec = LdapCodec { max_message_size: settings.max_message_size };
        let framed = Framed::new(PinnedStream(stream), codec);
        let (tx, rx) = mpsc::unbounded_channel();
        let next_id = Arc::new(AtomicI32::new(1));
        let mut ldap = Ldap::new(tx, next_id);
        if let Some(d) = settings.response_timeout {
            ldap.default_timeout = Some(d);
        }
        if settings.follow_referrals {
            ldap.with_referral_chasing(referral::default_connector(), settings.referral_hop_limit);
        }
        (
            LdapConnAsync {
                framed,
                rx,
                pending: HashMap::new(),
            },
            ldap,
        )
    }

    /// Drive the connection: relay outgoing requests from `Ldap` handles to
    /// the wire, and incoming responses back to their matching caller.
    /// Returns when every `Ldap` handle has been dropped (clean shutdown)
    /// or the transport errors out.
    pub async fn drive(mut self) -> Result<()> {
        loop {
            tokio::select! {
                req = self.rx.recv() => {
                    match req {
                        Some(req) => self.handle_outgoing(req).await?,
                        None => return Ok(()),
                    }
                }
                frame = self.framed.next() => {
                    match frame {
                        Some(Ok(msg)) => self.handle_incoming(msg),
                        Some(Err(e)) => {
                            self.fail_all_pending();
                            return Err(e);
                        }
                        None => {
                            self.fail_all_pending();
                            return Err(LdapError::ConnectionClosed);
                        }
                    }
                }
            }
        }
    }

    async fn handle_outgoing(&mut self, req: Request) -> Result<()> {
        let Request { id, tag, controls, op, deregister } = req;
        if let Some(target) = deregister {
            // Drop the acceptor before the AbandonRequest goes out, so a
            // response racing it on the wire is discarded rather than
            // delivered (spec: abandon is a local guarantee, independent
            // of whether the server actually stops work).
            self.pending.remove(&target);
        }
        match op {
            LdapOp::Single(tx) => {
                self.pending.insert(id, PendingOp::Single(tx));
            }
            LdapOp::Multi(tx) => {
                self.pending.insert(id, PendingOp::Multi(tx));
            }
            LdapOp::Solo => {}
        }
        self.framed
            .send((id, tag, controls))
            .await
            .map_err(|_| LdapError::ConnectionClosed)
    }

    fn handle_incoming(&mut self, msg: (RequestId, StructureTag, Vec<Control>)) {
        let (id, tag, ctrls) = msg;
        let is_search_done = tag.id == 5 && tag.class == TagClass::Application;
        match self.pending.remove(&id) {
            Some(PendingOp::Single(tx)) => {
                let _ = tx.send(Ok((tag, ctrls)));
            }
            Some(PendingOp::Multi(tx)) => {
                let _ = tx.send((tag, ctrls));
                if !is_search_done {
                    self.pending.insert(id, PendingOp::Multi(tx));
                }
            }
            None => {
                log::debug!("response for unknown or abandoned message id {id}");
            }
        }
    }

    /// Resolve every outstanding acceptor with `ConnectionClosed`. Called
    /// when the reader loop exits for any reason — clean EOF, a socket
    /// error, or an undecodable frame — since the wire is not
    /// resynchronizable after any of those and no further response will
    /// ever arrive for a pending message ID.
    fn fail_all_pending(&mut self) {
        for (_, op) in self.pending.drain() {
            if let PendingOp::Single(tx) = op {
                let _ = tx.send(Err(LdapError::ConnectionClosed));
            }
            // Dropping a Multi sender closes the receiver's stream, which
            // SearchStream surfaces as a premature end.
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use ber_codec::structures::{Integer, Null, OctetString};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio_util::codec::Decoder;

    /// Read one full `LDAPMessage` frame off `peer` into `buf` (which
    /// persists across calls, so bytes belonging to a later frame that
    /// arrive in the same read aren't dropped) and return its message ID
    /// and protocol-op tag.
    async fn read_request(
        peer: &mut tokio::io::DuplexStream,
        buf: &mut BytesMut,
    ) -> (RequestId, StructureTag) {
        let mut codec = LdapCodec::default();
        loop {
            if let Some((id, op, _)) = codec.decode(buf).unwrap() {
                return (id, op);
            }
            let mut chunk = [0u8; 256];
            let n = peer.read(&mut chunk).await.unwrap();
            assert!(n > 0, "peer closed before a full frame arrived");
            buf.extend_from_slice(&chunk[..n]);
        }
    }

    async fn read_request_id(peer: &mut tokio::io::DuplexStream, buf: &mut BytesMut) -> RequestId {
        read_request(peer, buf).await.0
    }

    /// Write a minimal `LDAPMessage` envelope carrying `op` under `id`,
    /// with no controls, to `peer`.
    async fn write_response(peer: &mut tokio::io::DuplexStream, id: RequestId, op: StructureTag) {
        let envelope = Tag::Sequence(ber_codec::structures::Sequence {
            inner: vec![
                Tag::Integer(Integer {
                    inner: id as i64,
                    ..Default::default()
                }),
                Tag::StructureTag(op),
            ],
            ..Default::default()
        });
        let mut out = Vec::new();
        ber_codec::write::write_tag(&mut out, &envelope.into_structure());
        peer.write_all(&out).await.unwrap();
    }

    fn dummy_op() -> Tag {
        Tag::OctetString(OctetString {
            id: 0,
            class: TagClass::Application,
            inner: b"probe".to_vec(),
        })
    }

    #[tokio::test]
    async fn response_is_routed_to_the_request_that_allocated_its_id() {
        let (local, mut peer) = tokio::io::duplex(4096);
        let (conn, mut ldap) = LdapConnAsync::from_stream(Box::pin(local), &LdapConnSettings::default());
        tokio::spawn(conn.drive());

        let send = tokio::spawn(async move { ldap.single_op(dummy_op()).await });
        let mut inbuf = BytesMut::new();
        let id = read_request_id(&mut peer, &mut inbuf).await;
        assert_eq!(id, 1, "message IDs start at 1");

        write_response(
            &mut peer,
            id,
            Tag::Null(Null {
                id: 9,
                class: TagClass::Application,
                inner: (),
            })
            .into_structure(),
        )
        .await;

        let (tag, ctrls) = send.await.unwrap().unwrap();
        assert_eq!(tag.id, 9);
        assert!(ctrls.is_empty());
    }

    #[tokio::test]
    async fn transport_teardown_fails_every_outstanding_acceptor() {
        let (local, mut peer) = tokio::io::duplex(4096);
        let (conn, mut ldap_a) = LdapConnAsync::from_stream(Box::pin(local), &LdapConnSettings::default());
        let mut ldap_b = ldap_a.clone();
        tokio::spawn(conn.drive());

        let send_a = tokio::spawn(async move { ldap_a.single_op(dummy_op()).await });
        let send_b = tokio::spawn(async move { ldap_b.single_op(dummy_op()).await });
        let mut inbuf = BytesMut::new();
        read_request_id(&mut peer, &mut inbuf).await;
        read_request_id(&mut peer, &mut inbuf).await;

        // Simulate the peer vanishing mid-flight: both requests are still
        // unanswered, so both acceptors must resolve with ConnectionClosed.
        drop(peer);

        assert!(matches!(send_a.await.unwrap(), Err(LdapError::ConnectionClosed)));
        assert!(matches!(send_b.await.unwrap(), Err(LdapError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn abandon_deregisters_the_acceptor_before_a_late_response_arrives() {
        let (local, mut peer) = tokio::io::duplex(4096);
        let (conn, mut ldap) = LdapConnAsync::from_stream(Box::pin(local), &LdapConnSettings::default());
        tokio::spawn(conn.drive());

        let mut send = tokio::spawn({
            let mut ldap = ldap.clone();
            async move { ldap.single_op(dummy_op()).await }
        });
        let mut inbuf = BytesMut::new();
        let (op_id, _) = read_request(&mut peer, &mut inbuf).await;

        // Abandon locally; the driver must drop op_id's acceptor even
        // though the server hasn't answered (or ever will).
        ldap.abandon_msgid(op_id).unwrap();
        let (abandon_id, abandon_tag) = read_request(&mut peer, &mut inbuf).await;
        assert_ne!(abandon_id, op_id, "abandon gets its own message ID");
        assert_eq!(abandon_tag.class, TagClass::Application);
        assert_eq!(abandon_tag.id, 16);
        let target = Integer::from_struct_bytes(&abandon_tag.expect_primitive().unwrap());
        assert_eq!(target, op_id as i64);

        assert!(matches!(
            tokio::time::timeout(Duration::from_secs(5), &mut send)
                .await
                .expect("abandon should resolve the pending op promptly")
                .unwrap(),
            Err(LdapError::ConnectionClosed)
        ));

        // A late response for the abandoned ID is silently dropped, not
        // delivered to a stale acceptor (there is none left to deliver to).
        write_response(
            &mut peer,
            op_id,
            Tag::Null(Null {
                id: 9,
                class: TagClass::Application,
                inner: (),
            })
            .into_structure(),
        )
        .await;
    }
}
