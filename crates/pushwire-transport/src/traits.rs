use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};

/// A source of device connections consumed by the accept loop.
///
/// The raw TCP listener implements this directly. A TLS-terminating
/// wrapper implements it by accepting on the inner listener and running
/// the handshake before returning the wrapped stream.
pub trait Acceptor {
    /// The connected stream handed to a session.
    type Stream: Send + 'static;

    /// Block until the next connection arrives.
    fn accept(&self) -> io::Result<(Self::Stream, SocketAddr)>;

    /// The local address the acceptor is bound to.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

impl Acceptor for TcpListener {
    type Stream = TcpStream;

    fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpListener::local_addr(self)
    }
}
