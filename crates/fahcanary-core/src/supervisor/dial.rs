//! Dialer seam: how the supervisor opens a connection.

use std::future::Future;
use tokio::io::AsyncRead;
use tokio::net::TcpStream;

use crate::retry::DialError;

/// Opens one connection to `addr`. Implementations report OS failures as a
/// layered `DialError` so the classifier can read them. The supervisor
/// applies the per-attempt timeout around `dial`.
pub trait Dialer: Send + Sync {
    type Conn: AsyncRead + Unpin + Send;

    fn dial(&self, addr: &str) -> impl Future<Output = Result<Self::Conn, DialError>> + Send;
}

/// Plain TCP dialer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDialer;

impl Dialer for TcpDialer {
    type Conn = TcpStream;

    async fn dial(&self, addr: &str) -> Result<TcpStream, DialError> {
        TcpStream::connect(addr)
            .await
            .map_err(|e| DialError::connect(addr, e))
    }
}

impl<D: Dialer> Dialer for &D {
    type Conn = D::Conn;

    fn dial(&self, addr: &str) -> impl Future<Output = Result<Self::Conn, DialError>> + Send {
        (**self).dial(addr)
    }
}
