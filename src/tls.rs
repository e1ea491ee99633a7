//! TLS connector setup and the StartTLS handshake.
//!
//! Two mutually exclusive TLS backends are supported, selected by Cargo
//! feature: `tls-native` (the default, backed by `native-tls`) and
//! `tls-rustls` (backed by `rustls`). Both produce a boxed
//! `AsyncReadWrite` so the rest of the connection code doesn't need to
//! know which one is in use.

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::result::{LdapError, Result};

/// Object-safe union of `AsyncRead + AsyncWrite`, so a `TcpStream`, a
/// `UnixStream`, and either TLS wrapper can all be driven behind one
/// `Box<dyn AsyncReadWrite>`.
pub(crate) trait AsyncReadWrite: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> AsyncReadWrite for T {}

pub(crate) type BoxedStream = Pin<Box<dyn AsyncReadWrite>>;

pub(crate) struct PinnedStream(pub(crate) BoxedStream);

impl AsyncRead for PinnedStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        self.0.as_mut().poll_read(cx, buf)
    }
}

impl AsyncWrite for PinnedStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        self.0.as_mut().poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        self.0.as_mut().poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        self.0.as_mut().poll_shutdown(cx)
    }
}

#[cfg(feature = "tls-native")]
pub(crate) async fn wrap_tls<S>(
    stream: S,
    hostname: &str,
    no_tls_verify: bool,
    connector: Option<native_tls::TlsConnector>,
) -> Result<tokio_native_tls::TlsStream<S>>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let connector = match connector {
        Some(c) => c,
        None => {
            let mut builder = native_tls::TlsConnector::builder();
            if no_tls_verify {
                builder.danger_accept_invalid_certs(true);
                builder.danger_accept_invalid_hostnames(true);
            }
            builder
                .build()
                .map_err(|e| LdapError::Tls(e.to_string()))?
        }
    };
    let connector = tokio_native_tls::TlsConnector::from(connector);
    connector
        .connect(hostname, stream)
        .await
        .map_err(|e| LdapError::Tls(e.to_string()))
}

#[cfg(feature = "tls-rustls")]
pub(crate) async fn wrap_tls<S>(
    stream: S,
    hostname: &str,
    no_tls_verify: bool,
    connector: Option<std::sync::Arc<rustls::ClientConfig>>,
) -> Result<tokio_rustls::client::TlsStream<S>>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    use std::sync::Arc;

    let config = match connector {
        Some(c) => c,
        None => {
            let mut roots = rustls::RootCertStore::empty();
            for cert in rustls_native_certs::load_native_certs()
                .map_err(|e| LdapError::Tls(e.to_string()))?
            {
                let _ = roots.add(&rustls::Certificate(cert.0));
            }
            let mut config = rustls::ClientConfig::builder()
                .with_safe_defaults()
                .with_root_certificates(roots)
                .with_no_client_auth();
            if no_tls_verify {
                config
                    .dangerous()
                    .set_certificate_verifier(std::sync::Arc::new(NoVerifier));
            }
            Arc::new(config)
        }
    };
    let connector = tokio_rustls::TlsConnector::from(config);
    let domain = tokio_rustls::rustls::ServerName::try_from(hostname)
        .map_err(|_| LdapError::Tls(format!("invalid hostname for TLS SNI: {hostname}")))?;
    connector
        .connect(domain, stream)
        .await
        .map_err(|e| LdapError::Tls(e.to_string()))
}

#[cfg(feature = "tls-rustls")]
struct NoVerifier;

#[cfg(feature = "tls-rustls")]
impl rustls::client::ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::Certificate,
        _intermediates: &[rustls::Certificate],
        _server_name: &rustls::ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: std::time::SystemTime,
    ) -> std::result::Result<rustls::client::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::ServerCertVerified::assertion())
    }
}
