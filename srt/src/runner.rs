//! C2 - Task Runner.
//!
//! A single background execution context that owns its SRT calls end to
//! end. One dedicated `std::thread` per [`crate::facade::Facade`], fed by
//! a single-producer single-consumer channel; requests are dispatched
//! strictly in arrival order and replies are posted in that same order,
//! so the facade never has to reconcile out-of-order completions.

use std::{
    net::SocketAddr,
    thread,
    time::Instant,
};

use crossbeam_channel::{Receiver, Sender};
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    error::{DispatchError, ErrorDescriptor, SrtError},
    native::{self, ffi::SRT_EPOLL_T, EventRecord, OptValue, SockOpt, SockState, Stats, SRTSOCKET},
};

/// One call into the native layer, carried from [`crate::facade::Facade`]
/// to the runner. Buffer arguments (`Write`) are moved in, never copied:
/// the facade's view is detached at submission time (see §5).
#[derive(Debug)]
pub enum Method {
    CreateSocket,
    Bind { fd: SRTSOCKET, addr: SocketAddr },
    Listen { fd: SRTSOCKET, backlog: u32 },
    Connect { fd: SRTSOCKET, addr: SocketAddr },
    Accept { fd: SRTSOCKET },
    Close { fd: SRTSOCKET },
    Read { fd: SRTSOCKET, max_bytes: usize },
    Write { fd: SRTSOCKET, buf: Vec<u8> },
    SetSockOpt { fd: SRTSOCKET, opt: SockOpt, value: OptValue },
    GetSockOpt { fd: SRTSOCKET, opt: SockOpt },
    GetSockState { fd: SRTSOCKET },
    Stats { fd: SRTSOCKET, clear: bool },
    EpollCreate,
    EpollAddUsock { eid: SRT_EPOLL_T, fd: SRTSOCKET, events: i32 },
    EpollRemoveUsock { eid: SRT_EPOLL_T, fd: SRTSOCKET },
    EpollUwait { eid: SRT_EPOLL_T, timeout_ms: i64 },
    SetLogLevel { level: i32 },
}

impl Method {
    fn tag(&self) -> &'static str {
        match self {
            Self::CreateSocket => "create_socket",
            Self::Bind { .. } => "bind",
            Self::Listen { .. } => "listen",
            Self::Connect { .. } => "connect",
            Self::Accept { .. } => "accept",
            Self::Close { .. } => "close",
            Self::Read { .. } => "read",
            Self::Write { .. } => "write",
            Self::SetSockOpt { .. } => "set_sockopt",
            Self::GetSockOpt { .. } => "get_sockopt",
            Self::GetSockState { .. } => "get_sock_state",
            Self::Stats { .. } => "stats",
            Self::EpollCreate => "epoll_create",
            Self::EpollAddUsock { .. } => "epoll_add_usock",
            Self::EpollRemoveUsock { .. } => "epoll_remove_usock",
            Self::EpollUwait { .. } => "epoll_uwait",
            Self::SetLogLevel { .. } => "set_log_level",
        }
    }

    /// Short diagnostic summary. Never dumps buffer contents - only their
    /// length - so a `Write` of a multi-megabyte payload doesn't end up
    /// echoed back wholesale in a Reply Envelope.
    fn args_desc(&self) -> String {
        match self {
            Self::Bind { fd, addr } => format!("fd={fd} addr={addr}"),
            Self::Listen { fd, backlog } => format!("fd={fd} backlog={backlog}"),
            Self::Connect { fd, addr } => format!("fd={fd} addr={addr}"),
            Self::Accept { fd } | Self::Close { fd } | Self::GetSockState { fd } => {
                format!("fd={fd}")
            }
            Self::Read { fd, max_bytes } => format!("fd={fd} max_bytes={max_bytes}"),
            Self::Write { fd, buf } => format!("fd={fd} len={}", buf.len()),
            Self::SetSockOpt { fd, opt, value } => format!("fd={fd} opt={opt:?} value={value}"),
            Self::GetSockOpt { fd, opt } => format!("fd={fd} opt={opt:?}"),
            Self::Stats { fd, clear } => format!("fd={fd} clear={clear}"),
            Self::EpollAddUsock { eid, fd, events } => {
                format!("eid={eid} fd={fd} events={events}")
            }
            Self::EpollRemoveUsock { eid, fd } => format!("eid={eid} fd={fd}"),
            Self::EpollUwait { eid, timeout_ms } => format!("eid={eid} timeout_ms={timeout_ms}"),
            Self::SetLogLevel { level } => format!("level={level}"),
            Self::CreateSocket | Self::EpollCreate => String::new(),
        }
    }
}

/// The scalar/buffer result of a dispatched [`Method`]. `Error` stands in
/// for the native `ERROR` sentinel - it is delivered to the caller as an
/// ordinary value, never as a rejected future (see §4.3).
#[derive(Debug, Clone)]
pub enum Value {
    Unit,
    Socket(SRTSOCKET),
    Data(Option<Vec<u8>>),
    Written(usize),
    SockState(SockState),
    Stats(Stats),
    EpollId(SRT_EPOLL_T),
    Events(Vec<EventRecord>),
    OptString(Option<String>),
    Error,
}

/// Carries `{result, optional error description, echoed method_tag +
/// arguments for diagnostics, enqueue_timestamp}` back to the facade.
#[derive(Debug, Clone)]
pub struct Reply {
    pub value: Value,
    pub native_error: Option<ErrorDescriptor>,
    pub dispatch_error: Option<DispatchError>,
    pub method_tag: &'static str,
    pub args_desc: String,
    pub submitted_at: Instant,
    pub enqueued_at: Instant,
}

struct Request {
    method: Method,
    submitted_at: Instant,
}

/// Runs on the worker thread; never touched from the host side once
/// spawned.
fn dispatch(method: &Method) -> (Value, Option<ErrorDescriptor>, Option<DispatchError>) {
    fn lift<T>(r: Result<T, SrtError>, to: impl FnOnce(T) -> Value) -> (Value, Option<ErrorDescriptor>) {
        match r {
            Ok(v) => (to(v), None),
            Err(e) => (Value::Error, Some(e.descriptor)),
        }
    }

    let (value, native_error) = match method {
        Method::CreateSocket => lift(native::create_socket(), Value::Socket),
        Method::Bind { fd, addr } => lift(native::bind(*fd, *addr), |_| Value::Unit),
        Method::Listen { fd, backlog } => lift(native::listen(*fd, *backlog), |_| Value::Unit),
        Method::Connect { fd, addr } => lift(native::connect(*fd, *addr), |_| Value::Unit),
        Method::Accept { fd } => lift(native::accept(*fd), Value::Socket),
        Method::Close { fd } => lift(native::close(*fd), |_| Value::Unit),
        Method::Read { fd, max_bytes } => lift(native::read(*fd, *max_bytes), Value::Data),
        Method::Write { fd, buf } => lift(native::write(*fd, buf), Value::Written),
        Method::SetSockOpt { fd, opt, value } => {
            lift(native::set_sockopt(*fd, *opt, value), |_| Value::Unit)
        }
        Method::GetSockOpt { fd, opt } => (Value::OptString(native::get_sockopt(*fd, *opt)), None),
        Method::GetSockState { fd } => (Value::SockState(native::get_sock_state(*fd)), None),
        Method::Stats { fd, clear } => lift(native::stats(*fd, *clear), Value::Stats),
        Method::EpollCreate => lift(native::epoll_create(), Value::EpollId),
        Method::EpollAddUsock { eid, fd, events } => {
            lift(native::epoll_add_usock(*eid, *fd, *events), |_| Value::Unit)
        }
        Method::EpollRemoveUsock { eid, fd } => {
            lift(native::epoll_remove_usock(*eid, *fd), |_| Value::Unit)
        }
        Method::EpollUwait { eid, timeout_ms } => {
            lift(native::epoll_uwait(*eid, *timeout_ms), Value::Events)
        }
        Method::SetLogLevel { level } => {
            native::set_log_level(*level);
            (Value::Unit, None)
        }
    };

    (value, native_error, None)
}

/// Owns the worker thread and the SPSC request channel feeding it. Replies
/// are posted onto `reply_tx`, owned by the pairing [`crate::facade::Facade`].
pub struct TaskRunner {
    request_tx: Option<Sender<Request>>,
}

impl TaskRunner {
    pub fn spawn(thread_name: String, reply_tx: UnboundedSender<Reply>) -> Self {
        let (request_tx, request_rx): (Sender<Request>, Receiver<Request>) =
            crossbeam_channel::unbounded();

        let spawned = thread::Builder::new().name(thread_name.clone()).spawn(move || {
            while let Ok(Request { method, submitted_at }) = request_rx.recv() {
                let tag = method.tag();
                let args_desc = method.args_desc();
                let (value, native_error, dispatch_error) = dispatch(&method);

                let reply = Reply {
                    value,
                    native_error,
                    dispatch_error,
                    method_tag: tag,
                    args_desc,
                    submitted_at,
                    enqueued_at: Instant::now(),
                };

                if reply_tx.send(reply).is_err() {
                    break;
                }
            }

            log::trace!("task runner '{}' exiting", thread_name);
        });

        if let Err(e) = spawned {
            log::error!("failed to spawn task runner thread: {e}");
            return Self { request_tx: None };
        }

        Self {
            request_tx: Some(request_tx),
        }
    }

    /// Enqueues `method`. Fails only once the worker channel has been
    /// closed by [`Self::dispose`] or the thread has died.
    pub fn submit(&self, method: Method) -> Result<(), ()> {
        match &self.request_tx {
            Some(tx) => tx
                .send(Request {
                    method,
                    submitted_at: Instant::now(),
                })
                .map_err(|_| ()),
            None => Err(()),
        }
    }

    /// Drops the sending half, closing the channel. Any in-flight request
    /// completes; anything still queued is discarded when the worker loop
    /// observes the closed channel and exits.
    pub fn dispose(&mut self) {
        self.request_tx.take();
    }
}
