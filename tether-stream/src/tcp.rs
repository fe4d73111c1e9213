//! TCP conveniences over [`bind`](crate::bind).

use std::io;
use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};

use tether::Pair;

use crate::stream::StreamHandle;

/// Bind a pair to an already-connected TCP stream.
pub fn bind_tcp(pair: &Pair, stream: TcpStream) -> io::Result<StreamHandle> {
    stream.set_nodelay(true)?;
    let (reader, writer) = stream.into_split();
    Ok(crate::bind(pair, reader, writer))
}

/// Connect to a listening peer and bind the pair to the connection.
pub async fn connect(pair: &Pair, addr: &str) -> io::Result<StreamHandle> {
    let stream = TcpStream::connect(addr).await?;
    tracing::debug!(pair = %pair.name(), addr = %addr, "tcp connected");
    bind_tcp(pair, stream)
}

/// Accept one connection and bind the pair to it.
pub async fn accept(pair: &Pair, listener: &TcpListener) -> io::Result<(StreamHandle, SocketAddr)> {
    let (stream, peer) = listener.accept().await?;
    tracing::debug!(pair = %pair.name(), peer = %peer, "tcp accepted");
    Ok((bind_tcp(pair, stream)?, peer))
}
