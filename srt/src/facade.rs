//! C3 - Async Facade.
//!
//! The host-thread API. Every method is a suspension point: it submits a
//! [`Method`] to the paired [`TaskRunner`], enqueues a completion
//! callback, and returns a future that resolves when the matching
//! [`Reply`] is dequeued - strictly in submission order, per §5.

use std::{
    collections::VecDeque,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::{
    error::{ErrorDescriptor, FacadeError},
    native::{ffi::SRT_EPOLL_T, EventRecord, OptValue, SockOpt, SockState, Stats, SRTSOCKET},
    runner::{Method, Reply, TaskRunner, Value},
};

type Waiter = oneshot::Sender<Reply>;

/// One-per-facade holder for the most recently observed transport error.
/// Written only by the reply pump (on the facade's own executor), read on
/// demand - no locking races to worry about, but we still guard it with a
/// `Mutex` since callers may poll it from any task.
#[derive(Default)]
struct ErrorSlot(Mutex<Option<ErrorDescriptor>>);

impl ErrorSlot {
    fn set(&self, descriptor: ErrorDescriptor) {
        *self.0.lock() = Some(descriptor);
    }

    fn get(&self) -> Option<ErrorDescriptor> {
        self.0.lock().clone()
    }
}

struct Inner {
    runner: Mutex<TaskRunner>,
    pending: Mutex<VecDeque<Waiter>>,
    error_slot: ErrorSlot,
    disposed: AtomicBool,
}

/// The host-thread API paired with one [`TaskRunner`] worker thread.
#[derive(Clone)]
pub struct Facade(Arc<Inner>);

impl Facade {
    /// Spawns the worker thread and the reply pump that keeps the pending
    /// callback queue aligned with the runner's reply order.
    pub fn spawn(thread_name: impl Into<String>) -> Self {
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<Reply>();
        let runner = TaskRunner::spawn(thread_name.into(), reply_tx);

        let inner = Arc::new(Inner {
            runner: Mutex::new(runner),
            pending: Mutex::new(VecDeque::new()),
            error_slot: ErrorSlot::default(),
            disposed: AtomicBool::new(false),
        });

        let pump_inner = inner.clone();
        tokio::spawn(async move {
            while let Some(reply) = reply_rx.recv().await {
                if let Some(descriptor) = &reply.native_error {
                    pump_inner.error_slot.set(descriptor.clone());
                }

                let waiter = pump_inner.pending.lock().pop_front();
                if let Some(waiter) = waiter {
                    // The future on the other end may already have failed
                    // on a timeout; sending into a dropped receiver is a
                    // harmless no-op, and the queue has still advanced.
                    let _ = waiter.send(reply);
                } else {
                    log::warn!(
                        "reply for '{}' arrived with no pending waiter",
                        reply.method_tag
                    );
                }
            }
        });

        Self(inner)
    }

    pub fn is_disposed(&self) -> bool {
        self.0.disposed.load(Ordering::Acquire)
    }

    pub fn last_error(&self) -> Option<ErrorDescriptor> {
        self.0.error_slot.get()
    }

    /// Submits `method`, returning its eventual [`Value`]. Never rejects
    /// for a native `ERROR` result - only for disposed-state submission or
    /// a worker-transport failure.
    pub async fn call(&self, method: Method) -> Result<Value, FacadeError> {
        self.call_with_timeout(method, None).await
    }

    pub async fn call_with_timeout(
        &self,
        method: Method,
        timeout: Option<Duration>,
    ) -> Result<Value, FacadeError> {
        if self.is_disposed() {
            return Err(FacadeError::Disposed);
        }

        let (tx, rx) = oneshot::channel();
        self.0.pending.lock().push_back(tx);

        if self.0.runner.lock().submit(method).is_err() {
            // The waiter we just queued will never be fulfilled; drop it
            // so a later reply doesn't try to match a long-dead request.
            self.0.pending.lock().pop_back();
            return Err(FacadeError::WorkerGone);
        }

        match timeout {
            Some(d) => match tokio::time::timeout(d, rx).await {
                Ok(Ok(reply)) => Ok(reply.value),
                Ok(Err(_)) => Err(FacadeError::WorkerGone),
                Err(_) => Err(FacadeError::Timeout),
            },
            None => rx.await.map(|r| r.value).map_err(|_| FacadeError::WorkerGone),
        }
    }

    /// Marks the facade disposed, drops every pending callback without
    /// invoking it, and closes the worker channel. Subsequent calls fail
    /// immediately with [`FacadeError::Disposed`].
    pub fn dispose(&self) {
        if self.0.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.0.pending.lock().clear();
        self.0.runner.lock().dispose();
    }

    // -- typed convenience wrappers over `call`, one per native operation --

    pub async fn create_socket(&self) -> Result<SRTSOCKET, FacadeError> {
        match self.call(Method::CreateSocket).await? {
            Value::Socket(fd) => Ok(fd),
            _ => Err(FacadeError::WorkerGone),
        }
    }

    pub async fn bind(&self, fd: SRTSOCKET, addr: SocketAddr) -> Result<(), FacadeError> {
        self.call(Method::Bind { fd, addr }).await.map(|_| ())
    }

    pub async fn bind_with_timeout(
        &self,
        fd: SRTSOCKET,
        addr: SocketAddr,
        timeout: Option<Duration>,
    ) -> Result<(), FacadeError> {
        self.call_with_timeout(Method::Bind { fd, addr }, timeout)
            .await
            .map(|_| ())
    }

    pub async fn listen(&self, fd: SRTSOCKET, backlog: u32) -> Result<(), FacadeError> {
        self.call(Method::Listen { fd, backlog }).await.map(|_| ())
    }

    pub async fn listen_with_timeout(
        &self,
        fd: SRTSOCKET,
        backlog: u32,
        timeout: Option<Duration>,
    ) -> Result<(), FacadeError> {
        self.call_with_timeout(Method::Listen { fd, backlog }, timeout)
            .await
            .map(|_| ())
    }

    pub async fn connect(&self, fd: SRTSOCKET, addr: SocketAddr) -> Result<(), FacadeError> {
        self.call(Method::Connect { fd, addr }).await.map(|_| ())
    }

    /// Resolves to `Err` only for facade-level failure; a failed native
    /// accept comes back as `Ok(None)`.
    pub async fn accept(&self, fd: SRTSOCKET) -> Result<Option<SRTSOCKET>, FacadeError> {
        match self.call(Method::Accept { fd }).await? {
            Value::Socket(new_fd) => Ok(Some(new_fd)),
            Value::Error => Ok(None),
            _ => Err(FacadeError::WorkerGone),
        }
    }

    /// As [`Self::accept`], but rejects the *future* after `timeout`
    /// without affecting the underlying blocking native call - see
    /// §5's cancellation note, the worker still completes whatever
    /// accept it was already running.
    pub async fn accept_with_timeout(
        &self,
        fd: SRTSOCKET,
        timeout: Option<Duration>,
    ) -> Result<Option<SRTSOCKET>, FacadeError> {
        match self.call_with_timeout(Method::Accept { fd }, timeout).await? {
            Value::Socket(new_fd) => Ok(Some(new_fd)),
            Value::Error => Ok(None),
            _ => Err(FacadeError::WorkerGone),
        }
    }

    pub async fn close(&self, fd: SRTSOCKET) -> Result<bool, FacadeError> {
        match self.call(Method::Close { fd }).await? {
            Value::Unit => Ok(true),
            Value::Error => Ok(false),
            _ => Err(FacadeError::WorkerGone),
        }
    }

    /// `Ok(Some(buf))` for data, `Ok(None)` for EOF/native `ERROR` alike -
    /// callers distinguish via [`Self::last_error`] if they care which.
    pub async fn read(&self, fd: SRTSOCKET, max_bytes: usize) -> Result<Option<Vec<u8>>, FacadeError> {
        match self.call(Method::Read { fd, max_bytes }).await? {
            Value::Data(buf) => Ok(buf),
            Value::Error => Ok(None),
            _ => Err(FacadeError::WorkerGone),
        }
    }

    /// Submits `buf` with ownership-transfer semantics: the argument is
    /// moved into the request, so the caller cannot observe it afterward.
    pub async fn write(&self, fd: SRTSOCKET, buf: Vec<u8>) -> Result<usize, FacadeError> {
        match self.call(Method::Write { fd, buf }).await? {
            Value::Written(n) => Ok(n),
            Value::Error => Ok(0),
            _ => Err(FacadeError::WorkerGone),
        }
    }

    pub async fn set_sockopt(
        &self,
        fd: SRTSOCKET,
        opt: SockOpt,
        value: OptValue,
    ) -> Result<bool, FacadeError> {
        match self.call(Method::SetSockOpt { fd, opt, value }).await? {
            Value::Unit => Ok(true),
            Value::Error => Ok(false),
            _ => Err(FacadeError::WorkerGone),
        }
    }

    /// Submits every `(option, value)` pair before awaiting any one
    /// result, per the spec's "applies the options in parallel" contract.
    pub async fn set_socket_flags(
        &self,
        fd: SRTSOCKET,
        options: Vec<(SockOpt, OptValue)>,
    ) -> Result<Vec<Result<bool, FacadeError>>, FacadeError> {
        if self.is_disposed() {
            return Err(FacadeError::Disposed);
        }

        let futures = options
            .into_iter()
            .map(|(opt, value)| self.set_sockopt(fd, opt, value));

        Ok(futures::future::join_all(futures).await)
    }

    pub async fn get_sockopt(&self, fd: SRTSOCKET, opt: SockOpt) -> Result<Option<String>, FacadeError> {
        match self.call(Method::GetSockOpt { fd, opt }).await? {
            Value::OptString(s) => Ok(s),
            _ => Err(FacadeError::WorkerGone),
        }
    }

    pub async fn get_sock_state(&self, fd: SRTSOCKET) -> Result<SockState, FacadeError> {
        match self.call(Method::GetSockState { fd }).await? {
            Value::SockState(s) => Ok(s),
            _ => Err(FacadeError::WorkerGone),
        }
    }

    pub async fn stats(&self, fd: SRTSOCKET, clear: bool) -> Result<Stats, FacadeError> {
        match self.call(Method::Stats { fd, clear }).await? {
            Value::Stats(s) => Ok(s),
            Value::Error => Ok(Stats::default()),
            _ => Err(FacadeError::WorkerGone),
        }
    }

    pub async fn epoll_create(&self) -> Result<SRT_EPOLL_T, FacadeError> {
        match self.call(Method::EpollCreate).await? {
            Value::EpollId(eid) => Ok(eid),
            _ => Err(FacadeError::WorkerGone),
        }
    }

    pub async fn epoll_create_with_timeout(
        &self,
        timeout: Option<Duration>,
    ) -> Result<SRT_EPOLL_T, FacadeError> {
        match self.call_with_timeout(Method::EpollCreate, timeout).await? {
            Value::EpollId(eid) => Ok(eid),
            _ => Err(FacadeError::WorkerGone),
        }
    }

    /// Fire-and-forget by design at the call site (see
    /// [`crate::server::Server`]'s accept path) - still awaitable here for
    /// callers that do want to confirm registration succeeded.
    pub async fn epoll_add_usock(
        &self,
        eid: SRT_EPOLL_T,
        fd: SRTSOCKET,
        events: i32,
    ) -> Result<bool, FacadeError> {
        match self.call(Method::EpollAddUsock { eid, fd, events }).await? {
            Value::Unit => Ok(true),
            Value::Error => Ok(false),
            _ => Err(FacadeError::WorkerGone),
        }
    }

    pub async fn epoll_add_usock_with_timeout(
        &self,
        eid: SRT_EPOLL_T,
        fd: SRTSOCKET,
        events: i32,
        timeout: Option<Duration>,
    ) -> Result<bool, FacadeError> {
        match self
            .call_with_timeout(Method::EpollAddUsock { eid, fd, events }, timeout)
            .await?
        {
            Value::Unit => Ok(true),
            Value::Error => Ok(false),
            _ => Err(FacadeError::WorkerGone),
        }
    }

    pub async fn epoll_remove_usock(&self, eid: SRT_EPOLL_T, fd: SRTSOCKET) -> Result<(), FacadeError> {
        self.call(Method::EpollRemoveUsock { eid, fd }).await.map(|_| ())
    }

    pub async fn epoll_uwait(
        &self,
        eid: SRT_EPOLL_T,
        timeout_ms: i64,
    ) -> Result<Vec<EventRecord>, FacadeError> {
        match self.call(Method::EpollUwait { eid, timeout_ms }).await? {
            Value::Events(events) => Ok(events),
            _ => Err(FacadeError::WorkerGone),
        }
    }

    pub async fn set_log_level(&self, level: i32) -> Result<(), FacadeError> {
        self.call(Method::SetLogLevel { level }).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ensure_startup() {
        static ONCE: std::sync::Once = std::sync::Once::new();
        ONCE.call_once(|| {
            let _ = crate::native::startup();
        });
    }

    #[tokio::test]
    async fn create_socket_then_close_round_trips() {
        ensure_startup();
        let facade = Facade::spawn("facade-test-roundtrip");
        let fd = facade.create_socket().await.expect("create should succeed");
        assert!(facade.close(fd).await.expect("close should succeed"));
        facade.dispose();
    }

    #[tokio::test]
    async fn calls_after_dispose_fail_immediately() {
        ensure_startup();
        let facade = Facade::spawn("facade-test-disposed");
        facade.dispose();
        assert!(facade.is_disposed());

        let result = facade.create_socket().await;
        assert!(matches!(result, Err(FacadeError::Disposed)));
    }

    #[tokio::test]
    async fn dispose_is_idempotent() {
        ensure_startup();
        let facade = Facade::spawn("facade-test-dispose-twice");
        facade.dispose();
        facade.dispose();
        assert!(facade.is_disposed());
    }

    #[tokio::test]
    async fn accept_timeout_does_not_reject_with_native_error() {
        ensure_startup();
        let facade = Facade::spawn("facade-test-timeout");
        let listener = facade.create_socket().await.expect("create should succeed");
        let listener_addr: SocketAddr = "127.0.0.1:9201".parse().unwrap();
        facade
            .bind(listener, listener_addr)
            .await
            .expect("bind should succeed");
        facade
            .listen(listener, 1)
            .await
            .expect("listen should succeed after bind");

        let result = facade
            .call_with_timeout(
                Method::Accept { fd: listener },
                Some(std::time::Duration::from_millis(50)),
            )
            .await;
        assert!(matches!(result, Err(FacadeError::Timeout)));

        // `listener` never had RCVSYN turned off, so the accept above is
        // still blocking the worker thread natively even though the
        // future timed out. Connect a peer to free the worker before
        // issuing the close below.
        let peer = Facade::spawn("facade-test-timeout-peer");
        let peer_fd = peer.create_socket().await.expect("peer create should succeed");
        peer.connect(peer_fd, listener_addr)
            .await
            .expect("peer connect should succeed");

        facade.close(listener).await.ok();
        facade.dispose();
        peer.close(peer_fd).await.ok();
        peer.dispose();
    }

    #[tokio::test]
    async fn set_socket_flags_submits_every_option_before_awaiting_any() {
        ensure_startup();
        let facade = Facade::spawn("facade-test-flags");
        let fd = facade.create_socket().await.expect("create should succeed");

        let results = facade
            .set_socket_flags(
                fd,
                vec![
                    (SockOpt::MESSAGEAPI, OptValue::Bool(true)),
                    (SockOpt::PAYLOADSIZE, OptValue::U32(1316)),
                ],
            )
            .await
            .expect("batch submission should not fail at the facade level");

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| matches!(r, Ok(true))));

        facade.close(fd).await.ok();
        facade.dispose();
    }
}
