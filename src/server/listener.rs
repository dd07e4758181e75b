use std::fmt;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;

use tracing::{debug, info, warn};

use crate::codec::Protocol;
use crate::config::Config;
use crate::error::ServerError;
use crate::handler::{Handler, NewHandler};
use crate::poll::{CancelToken, Pollable};
use crate::server::connection::Connection;
use crate::server::scheduler::Scheduler;

/// Stops a running [`Server`] from another thread.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    token: CancelToken,
}

impl ShutdownHandle {
    /// Stops accepting, cancels live connections on their next poll, and
    /// lets `serve` return once the workers have drained.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// A bound listener plus the protocol every accepted connection speaks.
pub struct Server<P> {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: Config,
    protocol: P,
    shutdown: CancelToken,
}

impl<P> Server<P>
where
    P: Protocol + Clone + Send + 'static,
{
    /// Binds `config.server.listen_addr`. Failing here is the only fatal
    /// error; it is returned before any connection is served.
    pub fn bind(config: Config, protocol: P) -> Result<Self, ServerError> {
        let addr = config.server.listen_addr.clone();
        let bind_err = |source: io::Error| ServerError::Bind {
            addr: addr.clone(),
            source,
        };

        let listener = TcpListener::bind(&addr).map_err(bind_err)?;
        listener.set_nonblocking(true).map_err(bind_err)?;
        let local_addr = listener.local_addr()?;

        info!("Listening on {}", local_addr);

        Ok(Self {
            listener,
            local_addr,
            config,
            protocol,
            shutdown: CancelToken::new(),
        })
    }

    /// The bound address, with the real port when binding to port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            token: self.shutdown.clone(),
        }
    }

    /// Runs the accept loop on the calling thread until shutdown is
    /// requested, then waits for all connections to retire.
    pub fn serve<N>(self, new_handler: N) -> Result<(), ServerError>
    where
        N: NewHandler,
        N::Handler: Handler<Request = P::Request, Response = P::Response> + Send + 'static,
        <N::Handler as Handler>::Reply: Send + 'static,
        <N::Handler as Handler>::Error: fmt::Display,
    {
        let scheduler = Scheduler::new(&self.config.scheduler)?;
        info!(workers = scheduler.workers(), "Serving connections");

        while !self.shutdown.is_cancelled() {
            match self.listener.accept() {
                Ok((stream, peer)) => self.register(&scheduler, &new_handler, stream, peer),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(self.config.server.accept_poll());
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    // Typically EMFILE/ENFILE: back off instead of spinning.
                    let err = ServerError::Accept(e);
                    warn!(error = %err, "Accept failed, retrying");
                    thread::sleep(self.config.server.accept_backoff());
                }
            }
        }

        info!("Shutdown requested, draining connections");
        scheduler.join();
        info!("Server stopped");
        Ok(())
    }

    fn register<N>(&self, scheduler: &Scheduler, new_handler: &N, stream: TcpStream, peer: SocketAddr)
    where
        N: NewHandler,
        N::Handler: Handler<Request = P::Request, Response = P::Response> + Send + 'static,
        <N::Handler as Handler>::Reply: Send + 'static,
        <N::Handler as Handler>::Error: fmt::Display,
    {
        if let Err(e) = stream.set_nonblocking(true) {
            warn!(peer = %peer, error = %e, "Failed to configure connection");
            return;
        }
        if self.config.server.tcp_nodelay {
            if let Err(e) = stream.set_nodelay(true) {
                debug!(peer = %peer, error = %e, "Failed to set TCP_NODELAY");
            }
        }

        let conn = Connection::new(
            stream,
            self.protocol.clone(),
            new_handler.new_handler(),
            &self.config.connection,
        )
        .with_peer(peer.to_string());

        match scheduler.spawn(conn.cancellable(self.shutdown.clone())) {
            Ok(worker) => info!(peer = %peer, worker, "Accepted connection"),
            Err(e) => warn!(peer = %peer, error = %e, "Failed to schedule connection"),
        }
    }
}

/// Binds and serves in one call. Blocks until the server is shut down.
pub fn serve<P, N>(config: Config, protocol: P, new_handler: N) -> Result<(), ServerError>
where
    P: Protocol + Clone + Send + 'static,
    N: NewHandler,
    N::Handler: Handler<Request = P::Request, Response = P::Response> + Send + 'static,
    <N::Handler as Handler>::Reply: Send + 'static,
    <N::Handler as Handler>::Error: fmt::Display,
{
    Server::bind(config, protocol)?.serve(new_handler)
}
