//! C1 - Native Binding.
//!
//! Thin synchronous facade over the SRT library: one function per native
//! call, each returning a scalar/buffer or an [`SrtError`]. Every function
//! here is blocking and must only ever be invoked from the
//! [`crate::runner::TaskRunner`] worker thread - nothing in this module
//! is async.

pub mod ffi;
pub mod options;

use std::{ffi::c_int, net::SocketAddr};

use libc::c_int as raw_c_int;
use os_socketaddr::OsSocketAddr;

pub use ffi::{SRTSOCKET, SRT_EPOLL_ERR as EPOLL_ERR, SRT_EPOLL_IN as EPOLL_READABLE};
pub use options::{OptValue, SockOpt, SrtOptions};

use crate::error::{SrtError, SrtErrorKind};

/// Readiness flags reported by [`epoll_uwait`], a subset of `{READABLE,
/// ERROR}` per the spec's Event Record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventFlags {
    pub readable: bool,
    pub error: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRecord {
    pub fd: SRTSOCKET,
    pub flags: EventFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SockState {
    Listening,
    Connected,
    Broken,
    NonExist,
    Closed,
    Other,
}

impl From<ffi::SRT_SOCKSTATUS> for SockState {
    fn from(value: ffi::SRT_SOCKSTATUS) -> Self {
        use ffi::SRT_SOCKSTATUS::*;
        match value {
            SRTS_LISTENING => SockState::Listening,
            SRTS_CONNECTED => SockState::Connected,
            SRTS_BROKEN => SockState::Broken,
            SRTS_NONEXIST => SockState::NonExist,
            SRTS_CLOSED => SockState::Closed,
            _ => SockState::Other,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub pkt_sent: i64,
    pub pkt_recv: i64,
    pub pkt_sent_loss: i32,
    pub pkt_recv_loss: i32,
    pub ms_rtt: f64,
    pub mbps_send_rate: f64,
    pub mbps_recv_rate: f64,
}

impl From<ffi::SRT_TRACEBSTATS> for Stats {
    fn from(s: ffi::SRT_TRACEBSTATS) -> Self {
        Self {
            pkt_sent: s.pkt_sent,
            pkt_recv: s.pkt_recv,
            pkt_sent_loss: s.pkt_sent_loss,
            pkt_recv_loss: s.pkt_recv_loss,
            ms_rtt: s.ms_rtt,
            mbps_send_rate: s.mbps_send_rate,
            mbps_recv_rate: s.mbps_recv_rate,
        }
    }
}

/// One-call, idempotent process-wide initializer. Safe to call from
/// multiple [`crate::facade::Facade`]s; the underlying library tracks its
/// own reference count.
pub fn startup() -> Result<(), SrtError> {
    if unsafe { ffi::srt_startup() } < 0 {
        SrtError::last(SrtErrorKind::StartupError)
    } else {
        Ok(())
    }
}

pub fn cleanup() {
    unsafe {
        ffi::srt_cleanup();
    }
}

pub fn set_log_level(level: i32) {
    unsafe { ffi::srt_setloglevel(level as raw_c_int) }
}

pub fn create_socket() -> Result<SRTSOCKET, SrtError> {
    let fd = unsafe { ffi::srt_create_socket() };
    if fd == ffi::SRT_INVALID_SOCK {
        SrtError::last(SrtErrorKind::InvalidSock)
    } else {
        Ok(fd)
    }
}

pub fn bind(fd: SRTSOCKET, addr: SocketAddr) -> Result<(), SrtError> {
    let addr: OsSocketAddr = addr.into();
    if unsafe { ffi::srt_bind(fd, addr.as_ptr() as *const _, addr.len() as c_int) } == ffi::SRT_ERROR
    {
        SrtError::last(SrtErrorKind::BindError)
    } else {
        Ok(())
    }
}

pub fn listen(fd: SRTSOCKET, backlog: u32) -> Result<(), SrtError> {
    if unsafe { ffi::srt_listen(fd, backlog as c_int) } == ffi::SRT_ERROR {
        SrtError::last(SrtErrorKind::ListenError)
    } else {
        Ok(())
    }
}

pub fn connect(fd: SRTSOCKET, addr: SocketAddr) -> Result<(), SrtError> {
    let addr: OsSocketAddr = addr.into();
    if unsafe { ffi::srt_connect(fd, addr.as_ptr() as *const _, addr.len() as c_int) }
        == ffi::SRT_ERROR
    {
        SrtError::last(SrtErrorKind::ConnectError)
    } else {
        Ok(())
    }
}

pub fn accept(fd: SRTSOCKET) -> Result<SRTSOCKET, SrtError> {
    let new_fd = unsafe { ffi::srt_accept(fd, std::ptr::null_mut(), std::ptr::null_mut()) };
    if new_fd == ffi::SRT_INVALID_SOCK {
        SrtError::last(SrtErrorKind::AcceptError)
    } else {
        Ok(new_fd)
    }
}

pub fn close(fd: SRTSOCKET) -> Result<(), SrtError> {
    if unsafe { ffi::srt_close(fd) } == ffi::SRT_ERROR {
        SrtError::last(SrtErrorKind::CloseError)
    } else {
        Ok(())
    }
}

/// `Ok(Some(buf))` for data, `Ok(None)` for EOF, `Err` for the native
/// `ERROR` sentinel.
pub fn read(fd: SRTSOCKET, max_bytes: usize) -> Result<Option<Vec<u8>>, SrtError> {
    let mut buf = vec![0u8; max_bytes];
    let ret = unsafe { ffi::srt_recv(fd, buf.as_mut_ptr() as *mut _, buf.len() as c_int) };
    if ret < 0 {
        SrtError::last(SrtErrorKind::RecvError)
    } else if ret == 0 {
        Ok(None)
    } else {
        buf.truncate(ret as usize);
        Ok(Some(buf))
    }
}

pub fn write(fd: SRTSOCKET, buf: &[u8]) -> Result<usize, SrtError> {
    let ret = unsafe { ffi::srt_send(fd, buf.as_ptr() as *const _, buf.len() as c_int) };
    if ret == ffi::SRT_ERROR {
        SrtError::last(SrtErrorKind::SendError)
    } else {
        Ok(ret as usize)
    }
}

pub fn set_sockopt(fd: SRTSOCKET, opt: SockOpt, value: &OptValue) -> Result<(), SrtError> {
    options::set_socket_flag(fd, opt, value)
}

pub fn get_sockopt(fd: SRTSOCKET, opt: SockOpt) -> Option<String> {
    options::get_sock_opt_str(fd, opt)
}

pub fn get_sock_state(fd: SRTSOCKET) -> SockState {
    unsafe { ffi::srt_getsockstate(fd) }.into()
}

pub fn stats(fd: SRTSOCKET, clear: bool) -> Result<Stats, SrtError> {
    let mut raw = ffi::SRT_TRACEBSTATS::default();
    if unsafe { ffi::srt_bstats(fd, &mut raw, clear as c_int) } == ffi::SRT_ERROR {
        SrtError::last(SrtErrorKind::StatsError)
    } else {
        Ok(raw.into())
    }
}

pub fn epoll_create() -> Result<ffi::SRT_EPOLL_T, SrtError> {
    let eid = unsafe { ffi::srt_epoll_create() };
    if eid < 0 {
        SrtError::last(SrtErrorKind::EpollError)
    } else {
        Ok(eid)
    }
}

pub fn epoll_add_usock(eid: ffi::SRT_EPOLL_T, fd: SRTSOCKET, events: c_int) -> Result<(), SrtError> {
    if unsafe { ffi::srt_epoll_add_usock(eid, fd, &events as *const c_int) } == ffi::SRT_ERROR {
        SrtError::last(SrtErrorKind::EpollError)
    } else {
        Ok(())
    }
}

pub fn epoll_remove_usock(eid: ffi::SRT_EPOLL_T, fd: SRTSOCKET) -> Result<(), SrtError> {
    if unsafe { ffi::srt_epoll_remove_usock(eid, fd) } == ffi::SRT_ERROR {
        SrtError::last(SrtErrorKind::EpollError)
    } else {
        Ok(())
    }
}

/// Waits up to `timeout_ms` for readiness on any registered socket.
pub fn epoll_uwait(eid: ffi::SRT_EPOLL_T, timeout_ms: i64) -> Result<Vec<EventRecord>, SrtError> {
    let mut raw: [ffi::SRT_EPOLL_EVENT; 64] = [ffi::SRT_EPOLL_EVENT { fd: 0, events: 0 }; 64];
    let n = unsafe {
        ffi::srt_epoll_uwait(eid, raw.as_mut_ptr(), raw.len() as c_int, timeout_ms)
    };

    if n < 0 {
        // Native uwait reports a plain timeout the same way as an error;
        // callers distinguish by checking srt_getlasterror if they care.
        // For the server loop a timeout and "no events" are equivalent.
        return Ok(Vec::new());
    }

    Ok(raw[..n as usize]
        .iter()
        .map(|e| EventRecord {
            fd: e.fd,
            flags: EventFlags {
                readable: e.events & ffi::SRT_EPOLL_IN != 0,
                error: e.events & ffi::SRT_EPOLL_ERR != 0,
            },
        })
        .collect())
}

pub fn epoll_release(eid: ffi::SRT_EPOLL_T) {
    unsafe {
        ffi::srt_epoll_release(eid);
    }
}
