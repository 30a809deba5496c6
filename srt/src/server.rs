//! C5 - Server Loop.
//!
//! Specializes the socket-owner lifecycle with listener semantics and an
//! epoll-driven dispatch loop. Owns the connection table; never touches a
//! [`Connection`] directly once registered, only through the epoll event
//! stream.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{atomic::AtomicU64, Arc},
    time::Duration,
};

use tokio::sync::Mutex;

use crate::{
    connection::Connection,
    error::FacadeError,
    events::EventEmitter,
    facade::Facade,
    native::{ffi::SRT_EPOLL_T, EPOLL_ERR, EPOLL_READABLE, SockState, SrtOptions, SRTSOCKET},
    owner::{OwnerState, SocketOwnerCore},
};

/// Process-visible configuration for one [`Server`] (§6).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub backlog: u32,
    pub epoll_poll_period_ms: u64,
    pub epoll_uwait_timeout_ms: i64,
    /// Applied to the listener's own bind/listen/epoll setup calls and to
    /// each `accept` in the poll loop. `None` lets those calls block the
    /// facade's waiter queue indefinitely, same as any other untimed call.
    pub call_timeout: Option<Duration>,
    pub options: SrtOptions,
}

impl ServerConfig {
    pub fn new(port: u16) -> Result<Self, FacadeError> {
        if port == 0 {
            return Err(FacadeError::Config(
                "server port must be a positive integer <= 65535".to_string(),
            ));
        }

        Ok(Self {
            addr: SocketAddr::new("0.0.0.0".parse().unwrap(), port),
            backlog: 65535,
            epoll_poll_period_ms: 0,
            epoll_uwait_timeout_ms: 0,
            call_timeout: None,
            options: SrtOptions::default(),
        })
    }
}

#[derive(Debug, Clone)]
pub enum ServerEvent {
    Created,
    Opened,
    Connection(Arc<Connection>),
    Disconnection(SRTSOCKET),
    Disposed,
}

struct ConnectionEntry {
    handle: Arc<Connection>,
}

/// Owns the listener socket, the epoll set, and the table of accepted
/// connections. Drives its own poll loop on the host runtime once
/// `open()` has completed.
pub struct Server {
    core: Mutex<SocketOwnerCore>,
    facade: Facade,
    config: ServerConfig,
    epoll: Mutex<Option<SRT_EPOLL_T>>,
    connections: Mutex<HashMap<SRTSOCKET, ConnectionEntry>>,
    events: EventEmitter<ServerEvent>,
    /// Bumped every time the loop is (re)scheduled; a stale generation
    /// observes it changed and stops rescheduling itself, implementing
    /// "superseded, not stacked" re-entrancy.
    generation: AtomicU64,
}

impl Server {
    pub fn new(facade: Facade, config: ServerConfig) -> Arc<Self> {
        let core = SocketOwnerCore::new(facade.clone(), config.options.clone());
        Arc::new(Self {
            core: Mutex::new(core),
            facade,
            config,
            epoll: Mutex::new(None),
            connections: Mutex::new(HashMap::new()),
            events: EventEmitter::new(),
            generation: AtomicU64::new(0),
        })
    }

    pub fn on_event(&self, listener: impl Fn(&ServerEvent) + Send + Sync + 'static) {
        self.events.on(listener);
    }

    pub async fn state(&self) -> OwnerState {
        self.core.lock().await.state()
    }

    /// `create()` - requires `None`, asks the facade for a socket,
    /// transitions to `Created`, emits `created`.
    pub async fn create(self: &Arc<Self>) -> Result<(), FacadeError> {
        self.core.lock().await.create().await?;

        self.events.emit(&ServerEvent::Created);
        Ok(())
    }

    /// Opening sequence: `bind` -> `listen` -> `epoll_create` -> emit
    /// `opened` -> register the listener fd -> start the poll loop. Each
    /// step awaits the previous one, bounded by `call_timeout` when the
    /// config sets one.
    pub async fn open(self: &Arc<Self>) -> Result<(), FacadeError> {
        let fd = {
            let core = self.core.lock().await;
            core.fd()
                .ok_or_else(|| FacadeError::State("open() called before create()".to_string()))?
        };

        let timeout = self.config.call_timeout;

        self.facade
            .bind_with_timeout(fd, self.config.addr, timeout)
            .await?;
        self.facade
            .listen_with_timeout(fd, self.config.backlog, timeout)
            .await?;

        let eid = self.facade.epoll_create_with_timeout(timeout).await?;
        *self.epoll.lock().await = Some(eid);

        self.core.lock().await.mark_open()?;
        self.events.emit(&ServerEvent::Opened);

        let events = EPOLL_READABLE | EPOLL_ERR;
        self.facade
            .epoll_add_usock_with_timeout(eid, fd, events, timeout)
            .await?;

        self.spawn_poll_loop();
        Ok(())
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.config.addr
    }

    /// Schedules the next `epoll_uwait` through the host runtime's timer
    /// facility. Bumping `generation` first means a loop iteration started
    /// under an older generation number quietly stops rescheduling itself
    /// once superseded, rather than stacking duplicate pollers.
    fn spawn_poll_loop(self: &Arc<Self>) {
        let this = self.clone();
        let my_generation = this
            .generation
            .fetch_add(1, std::sync::atomic::Ordering::AcqRel)
            + 1;

        tokio::spawn(async move {
            this.poll_loop(my_generation).await;
        });
    }

    async fn poll_loop(self: Arc<Self>, my_generation: u64) {
        loop {
            if self.facade.is_disposed() {
                log::trace!("server loop exiting: facade disposed");
                return;
            }

            if self.generation.load(std::sync::atomic::Ordering::Acquire) != my_generation {
                log::trace!("server loop superseded, exiting");
                return;
            }

            let eid = match *self.epoll.lock().await {
                Some(eid) => eid,
                None => return,
            };

            let events = self
                .facade
                .epoll_uwait(eid, self.config.epoll_uwait_timeout_ms)
                .await;

            match events {
                Ok(events) => {
                    for event in events {
                        self.handle_event(event.fd, event.flags.readable, event.flags.error)
                            .await;
                    }
                }
                Err(e) => {
                    log::warn!("epoll_uwait failed: {e}");
                }
            }

            if self.config.epoll_poll_period_ms == 0 {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(Duration::from_millis(self.config.epoll_poll_period_ms)).await;
            }
        }
    }

    async fn handle_event(self: &Arc<Self>, fd: SRTSOCKET, readable: bool, error: bool) {
        let listener_fd = self.core.lock().await.fd();

        if Some(fd) == listener_fd {
            match self.facade.get_sock_state(fd).await {
                Ok(SockState::Listening) if readable => self.accept_one(fd).await,
                Ok(state) => log::trace!("listener fd={fd} in state {state:?}, ignoring event"),
                Err(e) => log::warn!("get_sock_state(listener) failed: {e}"),
            }
            return;
        }

        let state = self.facade.get_sock_state(fd).await;
        match state {
            Ok(SockState::Broken | SockState::NonExist | SockState::Closed) => {
                self.disconnect(fd).await;
            }
            Ok(_) => {
                if error {
                    self.disconnect(fd).await;
                    return;
                }

                let handle = self
                    .connections
                    .lock()
                    .await
                    .get(&fd)
                    .map(|e| e.handle.clone());
                match handle {
                    Some(conn) => conn.notify_data(),
                    None => log::warn!("data-ready event for unknown fd={fd}, ignoring"),
                }
            }
            Err(e) => log::warn!("get_sock_state failed for fd={fd}: {e}"),
        }
    }

    async fn accept_one(self: &Arc<Self>, listener_fd: SRTSOCKET) {
        let accepted = match self
            .facade
            .accept_with_timeout(listener_fd, self.config.call_timeout)
            .await
        {
            Ok(Some(fd)) => fd,
            Ok(None) => {
                log::warn!("accept() returned ERROR on listener fd={listener_fd}");
                return;
            }
            Err(e) => {
                log::warn!("accept() failed: {e}");
                return;
            }
        };

        let eid = match *self.epoll.lock().await {
            Some(eid) => eid,
            None => return,
        };

        // Fire-and-forget by design: awaiting this would head-of-line
        // block the accept path behind epoll registration. If it fails,
        // the connection never sees a `data` event - see the open
        // question in the design notes.
        let facade_for_register = self.facade.clone();
        tokio::spawn(async move {
            let events = EPOLL_READABLE | EPOLL_ERR;
            if let Ok(false) = facade_for_register
                .epoll_add_usock(eid, accepted, events)
                .await
            {
                log::error!(
                    "epoll registration failed for accepted fd={accepted}, data events lost"
                );
            }
        });

        let connection = Connection::new(self.facade.clone(), accepted);
        self.connections.lock().await.insert(
            accepted,
            ConnectionEntry {
                handle: connection.clone(),
            },
        );

        self.events.emit(&ServerEvent::Connection(connection));
    }

    async fn disconnect(self: &Arc<Self>, fd: SRTSOCKET) {
        let entry = self.connections.lock().await.remove(&fd);
        if let Some(entry) = entry {
            if let Err(e) = entry.handle.close().await {
                log::warn!("connection close failed during disconnect for fd={fd}: {e}");
            }
        }

        self.events.emit(&ServerEvent::Disconnection(fd));
    }

    /// Closes the listener, disposes the facade, emits `disposed`, and
    /// detaches observers. Checked once per poll iteration by the loop
    /// itself via `facade.is_disposed()`.
    pub async fn dispose(self: &Arc<Self>) {
        if let Some(eid) = self.epoll.lock().await.take() {
            crate::native::epoll_release(eid);
        }

        let conns: Vec<Arc<Connection>> = self
            .connections
            .lock()
            .await
            .drain()
            .map(|(_, e)| e.handle)
            .collect();

        for conn in conns {
            if let Err(e) = conn.close().await {
                log::warn!("connection close failed during server dispose: {e}");
            }
        }

        self.core.lock().await.dispose().await;
        self.events.emit(&ServerEvent::Disposed);
        self.events.clear();
    }
}
