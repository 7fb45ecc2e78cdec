use std::fmt;
use std::io::{self, ErrorKind};
use std::net::{SocketAddr, TcpListener};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::error::{Result, TransportError};
use crate::panic::format_panic;
use crate::traits::Acceptor;

/// Delay before retrying an accept that failed with a temporary error.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Configuration for the device accept loop.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Fixed pause after a temporary accept error.
    pub retry_delay: Duration,
    /// Stop accepting after this many connections and wait for their
    /// sessions to finish. `None` accepts forever.
    pub session_limit: Option<usize>,
    /// Stack size for session threads. `None` keeps the platform default.
    pub session_stack_size: Option<usize>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            retry_delay: DEFAULT_RETRY_DELAY,
            session_limit: None,
            session_stack_size: None,
        }
    }
}

/// Listens for device connections and runs a session per connection.
pub struct DeviceListener<A = TcpListener> {
    acceptor: A,
    config: ListenerConfig,
    next_session_id: AtomicU64,
}

impl DeviceListener<TcpListener> {
    /// Bind a TCP listener on `addr` (e.g. `0.0.0.0:9090`).
    pub fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(|source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        info!(addr = %listener.local_addr()?, "listening for device connections");
        Ok(Self::from_acceptor(listener))
    }
}

impl<A: Acceptor> DeviceListener<A> {
    /// Wrap an existing acceptor, e.g. a TLS layer over a bound listener.
    pub fn from_acceptor(acceptor: A) -> Self {
        Self {
            acceptor,
            config: ListenerConfig::default(),
            next_session_id: AtomicU64::new(1),
        }
    }

    /// Override the listener configuration.
    pub fn with_config(mut self, config: ListenerConfig) -> Self {
        self.config = config;
        self
    }

    /// Bound local address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.acceptor.local_addr()?)
    }

    /// Accept connections and start a session for each one.
    ///
    /// Temporary accept errors are logged and retried after
    /// [`ListenerConfig::retry_delay`]. Any other accept error ends the loop
    /// and is returned. Each session runs on its own thread; an error or a
    /// panic inside it is logged and only closes that connection.
    ///
    /// With a session limit configured the loop returns `Ok(())` once that
    /// many connections were accepted and all their sessions have ended.
    pub fn accept_loop<F, E>(&self, session: F) -> Result<()>
    where
        F: Fn(A::Stream, SocketAddr) -> std::result::Result<(), E> + Send + Sync + 'static,
        E: fmt::Display,
    {
        let session = Arc::new(session);
        let mut sessions = Sessions::default();
        let mut accepted = 0usize;

        loop {
            if let Some(limit) = self.config.session_limit {
                if accepted >= limit {
                    break;
                }
            }

            let (stream, peer) = match self.acceptor.accept() {
                Ok(conn) => conn,
                Err(err) if is_temporary(&err) => {
                    warn!(error = %err, "device listener: retrying");
                    thread::sleep(self.config.retry_delay);
                    continue;
                }
                Err(err) => return Err(TransportError::Accept(err)),
            };
            accepted = accepted.saturating_add(1);

            let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
            debug!(session = id, %peer, "accepted device connection");

            let session = Arc::clone(&session);
            let mut builder = thread::Builder::new().name(format!("device-session-{id}"));
            if let Some(size) = self.config.session_stack_size {
                builder = builder.stack_size(size);
            }
            let handle = builder
                .spawn(move || run_session(id, peer, stream, session.as_ref()))
                .map_err(|source| TransportError::Spawn {
                    peer: peer.to_string(),
                    source,
                })?;

            if self.config.session_limit.is_some() {
                sessions.0.push(handle);
            }
        }

        Ok(())
    }
}

fn run_session<S, F, E>(id: u64, peer: SocketAddr, stream: S, session: &F)
where
    F: Fn(S, SocketAddr) -> std::result::Result<(), E>,
    E: fmt::Display,
{
    match panic::catch_unwind(AssertUnwindSafe(|| session(stream, peer))) {
        Ok(Ok(())) => debug!(session = id, %peer, "device session finished"),
        Ok(Err(err)) => warn!(session = id, %peer, error = %err, "device session failed"),
        Err(payload) => error!(
            session = id,
            %peer,
            panic = %format_panic(payload),
            "terminating device connection on panic"
        ),
    }
}

/// Session threads still owed a join; joined on drop so that every exit
/// from the accept loop waits for them.
#[derive(Default)]
struct Sessions(Vec<thread::JoinHandle<()>>);

impl Drop for Sessions {
    fn drop(&mut self) {
        for handle in self.0.drain(..) {
            // Session panics are caught inside the thread.
            let _ = handle.join();
        }
    }
}

/// Whether an accept error is transient and worth retrying.
pub fn is_temporary(err: &io::Error) -> bool {
    match err.kind() {
        ErrorKind::Interrupted
        | ErrorKind::WouldBlock
        | ErrorKind::ConnectionAborted
        | ErrorKind::ConnectionReset
        | ErrorKind::TimedOut => true,
        _ => err.raw_os_error().is_some_and(is_resource_exhaustion),
    }
}

#[cfg(unix)]
fn is_resource_exhaustion(code: i32) -> bool {
    matches!(
        code,
        libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM
    )
}

#[cfg(not(unix))]
fn is_resource_exhaustion(_code: i32) -> bool {
    false
}
