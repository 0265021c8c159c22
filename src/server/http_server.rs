use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use may::coroutine::JoinHandle;
use may_minihttp::{HttpServerWithHeaders, HttpService};
use tracing::info;

/// Wrapper around `may_minihttp`'s server accepting up to 32 request headers.
pub struct HttpServer<T>(pub T);

/// Handle to a running server.
pub struct ServerHandle {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ServerHandle {
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Poll the listening socket until it accepts connections.
    ///
    /// # Errors
    ///
    /// `TimedOut` when the server is not accepting after about 250ms.
    pub fn wait_ready(&self) -> io::Result<()> {
        for _ in 0..50 {
            if TcpStream::connect(self.addr).is_ok() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    /// Cancel the server coroutine and wait for it to finish.
    pub fn stop(self) {
        // SAFETY: the handle is owned and the coroutine is not used after cancellation.
        unsafe {
            self.handle.coroutine().cancel();
        }
        if self.handle.join().is_err() {
            info!(addr = %self.addr, "server coroutine ended with a panic");
        }
    }

    /// Block until the server stops.
    ///
    /// # Errors
    ///
    /// The server coroutine panicked.
    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}

impl<T: HttpService + Clone + Send + Sync + 'static> HttpServer<T> {
    /// Bind `addr` and start serving.
    ///
    /// # Errors
    ///
    /// Unresolvable addresses and bind failures.
    pub fn start<A: ToSocketAddrs>(self, addr: A) -> io::Result<ServerHandle> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid address"))?;
        let handle = HttpServerWithHeaders::<_, 32>(self.0).start(addr)?;
        info!(addr = %addr, "listening");
        Ok(ServerHandle { addr, handle })
    }
}
