//! C6 - Connection Handle.
//!
//! The caller-facing object for one accepted socket. Thin: it owns no
//! lifecycle state of its own beyond "closed or not" and delegates every
//! native call to the shared [`Facade`]. [`crate::server::Server`] is the
//! only thing that constructs one and the only thing that feeds it
//! `notify_data`.

use std::sync::{atomic::AtomicBool, Arc};

use sync::atomic::EasyAtomic;

use crate::{error::FacadeError, events::EventEmitter, facade::Facade, native::SRTSOCKET};

#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// Fired the first time data becomes available to read, and on every
    /// readiness notification after.
    Data,
    Closing,
    /// Carries the native close's outcome: `true` on a clean close, `false`
    /// if the native call itself failed. Either way the transition to
    /// closed still completes.
    Closed(bool),
}

/// One accepted connection. Readable until the turn after `closed` fires -
/// see the open question recorded in the design notes: the fd stays valid
/// for one more poll iteration so a reader that raced the event can still
/// drain what's left in the native buffer.
pub struct Connection {
    facade: Facade,
    fd: SRTSOCKET,
    /// Guards against a second effective `close()` call; flips before
    /// `closing` is even emitted.
    closing_started: AtomicBool,
    /// The public "is this handle dead" flag. Per the open question on
    /// close timing, this only flips on the turn *after* `closed` fires -
    /// observers of `closed` still see the fd as live.
    closed: AtomicBool,
    first_data_observed: AtomicBool,
    events: EventEmitter<ConnectionEvent>,
}

impl Connection {
    pub(crate) fn new(facade: Facade, fd: SRTSOCKET) -> Arc<Self> {
        Arc::new(Self {
            facade,
            fd,
            closing_started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            first_data_observed: AtomicBool::new(false),
            events: EventEmitter::new(),
        })
    }

    pub fn fd(&self) -> SRTSOCKET {
        self.fd
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    pub fn on_event(&self, listener: impl Fn(&ConnectionEvent) + Send + Sync + 'static) {
        self.events.on(listener);
    }

    /// Called by [`crate::server::Server`] from the poll loop when epoll
    /// reports this fd readable. Emits `data` on first observation and on
    /// every readiness notification thereafter - the spec tracks "first
    /// ever" separately so callers can distinguish an initial burst from
    /// steady-state traffic if they care to.
    pub(crate) fn notify_data(&self) {
        if self.closed.get() {
            return;
        }

        self.first_data_observed.update(true);
        self.events.emit(&ConnectionEvent::Data);
    }

    pub fn first_data_observed(&self) -> bool {
        self.first_data_observed.get()
    }

    /// Hands out a fresh chunked I/O helper bound to this connection's
    /// `(facade, fd)` pair. Cheap enough to call per use rather than cache.
    pub fn get_reader_writer(&self) -> crate::io::ChunkedIo {
        crate::io::ChunkedIo::new(self.facade.clone(), self.fd)
    }

    /// `Ok(Some(buf))` for a chunk, `Ok(None)` for EOF/native `ERROR`
    /// alike - callers wanting to tell them apart use [`Facade::last_error`].
    pub async fn read(&self, max_bytes: usize) -> Result<Option<Vec<u8>>, FacadeError> {
        if self.closed.get() {
            return Ok(None);
        }

        self.facade.read(self.fd, max_bytes).await
    }

    pub async fn write(&self, buf: Vec<u8>) -> Result<usize, FacadeError> {
        if self.closed.get() {
            return Err(FacadeError::State("connection already closed".to_string()));
        }

        self.facade.write(self.fd, buf).await
    }

    /// Idempotent. Emits `closing` before the native close, `closed(result)`
    /// after, regardless of whether the native call itself succeeded - a
    /// failing native close still completes the transition to closed, but
    /// the caller can observe the failure through the returned `Result`
    /// and through the `Closed` event's payload. The fd is still considered
    /// live while `closed` observers run; it only goes dead on the
    /// following turn, matching what the source does. Detaches every
    /// observer once the transition is complete.
    ///
    /// A second call on an already-closing handle is a no-op that reports
    /// the first call's outcome as `Ok(true)` without touching the facade
    /// again.
    pub async fn close(&self) -> Result<bool, FacadeError> {
        if self.closing_started.update(true) {
            return Ok(true);
        }

        self.events.emit(&ConnectionEvent::Closing);

        let result = match self.facade.close(self.fd).await {
            Ok(ok) => Ok(ok),
            Err(e) => {
                log::warn!("connection close failed for fd={}: {e}", self.fd);
                Err(e)
            }
        };

        self.events
            .emit(&ConnectionEvent::Closed(*result.as_ref().unwrap_or(&false)));

        tokio::task::yield_now().await;
        self.closed.update(true);
        self.events.clear();

        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{atomic::AtomicUsize, Arc as StdArc};

    use super::*;

    fn ensure_startup() {
        static ONCE: std::sync::Once = std::sync::Once::new();
        ONCE.call_once(|| {
            let _ = crate::native::startup();
        });
    }

    #[tokio::test]
    async fn closed_fires_after_closing_and_fd_is_still_live_during_it() {
        ensure_startup();
        let facade = Facade::spawn("connection-test-close-order");
        let fd = facade.create_socket().await.expect("create should succeed");
        let conn = Connection::new(facade.clone(), fd);

        let order = StdArc::new(parking_lot::Mutex::new(Vec::new()));
        let order_clone = order.clone();
        let conn_clone = conn.clone();
        conn.on_event(move |event| {
            let still_live = !conn_clone.is_closed();
            order_clone.lock().push((format!("{event:?}"), still_live));
        });

        assert!(!conn.is_closed());
        let result = conn.close().await;
        assert!(conn.is_closed());
        assert_eq!(result, Ok(true));

        let order = order.lock();
        assert_eq!(order[0].0, "Closing");
        assert_eq!(order[1].0, "Closed(true)");
        // `closed` observers still saw the handle as live - the null-out
        // happens on the following turn, not before the event fires.
        assert!(order[1].1);

        facade.dispose();
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        ensure_startup();
        let facade = Facade::spawn("connection-test-close-twice");
        let fd = facade.create_socket().await.expect("create should succeed");
        let conn = Connection::new(facade.clone(), fd);

        let closed_count = StdArc::new(AtomicUsize::new(0));
        let closed_count_clone = closed_count.clone();
        conn.on_event(move |event| {
            if matches!(event, ConnectionEvent::Closed(_)) {
                closed_count_clone.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            }
        });

        let first = conn.close().await;
        let second = conn.close().await;

        assert_eq!(first, Ok(true));
        assert_eq!(second, Ok(true), "a second close() reports the first outcome");
        assert_eq!(
            closed_count.load(std::sync::atomic::Ordering::Relaxed),
            1,
            "a second close() must be a no-op"
        );

        facade.dispose();
    }

    #[tokio::test]
    async fn close_detaches_observers() {
        ensure_startup();
        let facade = Facade::spawn("connection-test-close-detach");
        let fd = facade.create_socket().await.expect("create should succeed");
        let conn = Connection::new(facade.clone(), fd);

        let seen = StdArc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        conn.on_event(move |_| {
            seen_clone.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        });

        conn.close().await.ok();
        let before = seen.load(std::sync::atomic::Ordering::Relaxed);
        assert!(before > 0);

        // Observers are detached once close() completes; notify_data is a
        // no-op on a closed handle regardless, but a stray direct emit
        // must not reach the old listener either.
        conn.events.emit(&ConnectionEvent::Data);
        assert_eq!(seen.load(std::sync::atomic::Ordering::Relaxed), before);

        facade.dispose();
    }

    #[tokio::test]
    async fn notify_data_sets_first_data_observed() {
        ensure_startup();
        let facade = Facade::spawn("connection-test-notify-data");
        let fd = facade.create_socket().await.expect("create should succeed");
        let conn = Connection::new(facade.clone(), fd);

        assert!(!conn.first_data_observed());
        conn.notify_data();
        assert!(conn.first_data_observed());

        conn.close().await.ok();
        facade.dispose();
    }
}
