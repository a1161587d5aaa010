//! RPC server lifecycle: construct, start in the background, stop with a
//! deadline.

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use axum::Router;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, watch};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn, Span};

use chatsync_shared::constants::DEFAULT_RPC_ADDR;

use crate::api::build_router;
use crate::client::{ChatClient, ClientBinding};
use crate::error::RpcError;
use crate::guard::{raised, RequestGuard};
use crate::state::{AppState, SyncFlag};
use crate::store::Store;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024; // 1 MiB

/// How long a force-closed server gets to drain before its task is aborted.
const FORCE_CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Time given to the 503s written on force-close before sockets are dropped.
const FORCE_CLOSE_FLUSH: Duration = Duration::from_millis(250);

/// Pause after a failed accept (e.g. out of file descriptors).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Construction options.
pub struct Options {
    /// Listen address; empty means `localhost:5555`.
    pub addr: String,
    /// Required.
    pub store: Option<Arc<dyn Store>>,
    /// Initial client, if one is already authenticated.
    pub client: Option<Arc<dyn ChatClient>>,
    /// Parent span for everything the server logs.
    pub span: Option<Span>,
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            addr: String::new(),
            store: None,
            client: None,
            span: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

enum Lifecycle {
    Created,
    Starting,
    Started(Running),
    Stopped,
}

struct Running {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

pub struct Server {
    addr: String,
    state: AppState,
    request_timeout: Duration,
    max_body_bytes: usize,
    force_close: watch::Sender<bool>,
    lifecycle: Mutex<Lifecycle>,
}

impl Server {
    pub fn new(opts: Options) -> Result<Self, RpcError> {
        let store = opts.store.ok_or(RpcError::MissingStore)?;
        let addr = match opts.addr.trim() {
            "" => DEFAULT_RPC_ADDR.to_string(),
            addr => addr.to_string(),
        };
        let span = opts
            .span
            .unwrap_or_else(|| tracing::info_span!("rpc", component = "rpc"));
        let (force_close, _) = watch::channel(false);

        Ok(Self {
            addr,
            state: AppState {
                store,
                client: ClientBinding::new(opts.client),
                sync_running: SyncFlag::default(),
                started_at: Instant::now(),
                span,
            },
            request_timeout: opts.request_timeout,
            max_body_bytes: opts.max_body_bytes,
            force_close,
            lifecycle: Mutex::new(Lifecycle::Created),
        })
    }

    /// Bind the listener and serve in the background.
    ///
    /// Returns the bound address once the listener accepts connections. A
    /// bind failure leaves the server unstarted.
    pub async fn start(&self) -> Result<SocketAddr, RpcError> {
        {
            let mut lifecycle = self.lifecycle();
            match *lifecycle {
                Lifecycle::Created => *lifecycle = Lifecycle::Starting,
                Lifecycle::Starting | Lifecycle::Started(_) => {
                    return Err(RpcError::AlreadyStarted)
                }
                Lifecycle::Stopped => return Err(RpcError::Stopped),
            }
        }

        let (listener, local_addr) = match self.bind().await {
            Ok(bound) => bound,
            Err(source) => {
                let mut lifecycle = self.lifecycle();
                if matches!(*lifecycle, Lifecycle::Starting) {
                    *lifecycle = Lifecycle::Created;
                }
                return Err(RpcError::Bind {
                    addr: self.addr.clone(),
                    source,
                });
            }
        };

        let mut lifecycle = self.lifecycle();
        if !matches!(*lifecycle, Lifecycle::Starting) {
            // Stopped while the listener was being bound.
            return Err(RpcError::Stopped);
        }

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(serve(
            listener,
            self.router(),
            shutdown_rx,
            self.force_close.subscribe(),
            self.state.span.clone(),
        ));

        *lifecycle = Lifecycle::Started(Running {
            local_addr,
            shutdown,
            task,
        });
        drop(lifecycle);

        info!(parent: &self.state.span, addr = %local_addr, "RPC server listening");
        Ok(local_addr)
    }

    /// Stop accepting connections and drain in-flight requests.
    ///
    /// A no-op on a server that was never started or is already stopped.
    /// Requests still running when `deadline` elapses are answered with a
    /// 503 envelope and every remaining connection, idle or half-read, is
    /// closed; the server is stopped either way.
    pub async fn stop(&self, deadline: Duration) -> Result<(), RpcError> {
        let running = {
            let mut lifecycle = self.lifecycle();
            match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
                Lifecycle::Started(running) => running,
                Lifecycle::Created => {
                    *lifecycle = Lifecycle::Created;
                    return Ok(());
                }
                Lifecycle::Starting | Lifecycle::Stopped => return Ok(()),
            }
        };

        let Running {
            local_addr,
            shutdown,
            mut task,
        } = running;
        info!(parent: &self.state.span, addr = %local_addr, ?deadline, "Stopping RPC server");

        let _ = shutdown.send(());
        match tokio::time::timeout(deadline, &mut task).await {
            Ok(result) => {
                self.log_serve_exit(result);
                Ok(())
            }
            Err(_) => {
                warn!(
                    parent: &self.state.span,
                    ?deadline,
                    "In-flight requests outlived the shutdown deadline, forcing close"
                );
                self.force_close.send_replace(true);

                match tokio::time::timeout(FORCE_CLOSE_GRACE, &mut task).await {
                    Ok(result) => self.log_serve_exit(result),
                    Err(_) => task.abort(),
                }
                Err(RpcError::ShutdownDeadline(deadline))
            }
        }
    }

    /// Attach (or replace) the live chat client. Valid in any state.
    pub fn bind_client(&self, client: Arc<dyn ChatClient>) {
        self.state.client.bind(client);
        info!(parent: &self.state.span, "Chat client bound to RPC server");
    }

    pub fn set_sync_running(&self, running: bool) {
        self.state.sync_running.set(running);
    }

    pub fn sync_running(&self) -> bool {
        self.state.sync_running.get()
    }

    /// Configured listen address.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Bound address while started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &*self.lifecycle() {
            Lifecycle::Started(running) => Some(running.local_addr),
            _ => None,
        }
    }

    pub fn is_started(&self) -> bool {
        matches!(*self.lifecycle(), Lifecycle::Started(_))
    }

    pub fn store(&self) -> Arc<dyn Store> {
        Arc::clone(&self.state.store)
    }

    pub fn span(&self) -> &Span {
        &self.state.span
    }

    /// The full route table, for serving in-process.
    pub fn router(&self) -> Router {
        let guard = RequestGuard::new(
            self.request_timeout,
            self.force_close.subscribe(),
            self.state.span.clone(),
        );
        build_router(self.state.clone(), guard, self.max_body_bytes)
    }

    pub(crate) fn sync_flag(&self) -> SyncFlag {
        self.state.sync_running.clone()
    }

    async fn bind(&self) -> io::Result<(TcpListener, SocketAddr)> {
        let listener = TcpListener::bind(&self.addr).await?;
        let local_addr = listener.local_addr()?;
        Ok((listener, local_addr))
    }

    fn log_serve_exit(&self, result: Result<(), JoinError>) {
        match result {
            Ok(()) => info!(parent: &self.state.span, "RPC server stopped"),
            Err(e) => error!(parent: &self.state.span, error = %e, "RPC server task failed"),
        }
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Accept loop. Every connection runs in `connections` so that a forced
/// close can drop all of them, including ones still reading headers.
async fn serve(
    listener: TcpListener,
    router: Router,
    mut shutdown: oneshot::Receiver<()>,
    force_close: watch::Receiver<bool>,
    span: Span,
) {
    let (drain, draining) = watch::channel(false);
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(parent: &span, %peer, "Connection accepted");
                    connections.spawn(serve_connection(
                        stream,
                        router.clone(),
                        draining.clone(),
                        span.clone(),
                    ));
                }
                Err(e) => {
                    warn!(parent: &span, error = %e, "Failed to accept connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    drop(listener);
    drain.send_replace(true);

    let forced = raised(force_close);
    tokio::pin!(forced);
    loop {
        tokio::select! {
            joined = connections.join_next() => {
                if joined.is_none() {
                    break;
                }
            }
            _ = &mut forced => {
                let _ = tokio::time::timeout(FORCE_CLOSE_FLUSH, async {
                    while connections.join_next().await.is_some() {}
                })
                .await;
                if !connections.is_empty() {
                    warn!(parent: &span, open = connections.len(), "Dropping open connections");
                }
                connections.shutdown().await;
                break;
            }
        }
    }
}

/// One HTTP/1.1 connection. Once `draining` is raised the connection
/// finishes its current request and closes.
async fn serve_connection(
    stream: TcpStream,
    router: Router,
    draining: watch::Receiver<bool>,
    span: Span,
) {
    let conn = http1::Builder::new()
        .serve_connection(TokioIo::new(stream), TowerToHyperService::new(router));
    tokio::pin!(conn);

    let mut shutting_down = false;
    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    debug!(parent: &span, error = %e, "Connection ended with error");
                }
                break;
            }
            _ = raised(draining.clone()), if !shutting_down => {
                shutting_down = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    }
}
