//! Raw declarations for the subset of the SRT C API this crate drives.
//!
//! Mirrors `srt.h`: one `extern "C"` entry per native call, plus the
//! option/state/epoll-event enumerations needed to use them. Nothing in
//! this module is safe to call directly outside of [`super`] - pointers,
//! lengths and the `ERROR` sentinel are exactly as the library defines
//! them.

use std::ffi::{c_char, c_int, c_void};

/// Opaque per-process socket id. Not an OS file descriptor.
pub type SRTSOCKET = i32;

/// Opaque epoll-set id, scoped to one [`crate::server::Server`].
pub type SRT_EPOLL_T = c_int;

pub const SRT_INVALID_SOCK: SRTSOCKET = -1;
pub const SRT_ERROR: c_int = -1;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SRT_SOCKSTATUS {
    SRTS_INIT = 1,
    SRTS_OPENED = 2,
    SRTS_LISTENING = 5,
    SRTS_CONNECTING = 6,
    SRTS_CONNECTED = 7,
    SRTS_BROKEN = 8,
    SRTS_CLOSING = 9,
    SRTS_CLOSED = 10,
    SRTS_NONEXIST = 11,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SRT_SOCKOPT {
    SRTO_MSS = 0,
    SRTO_SNDSYN = 1,
    SRTO_RCVSYN = 2,
    SRTO_FC = 4,
    SRTO_SNDBUF = 5,
    SRTO_RCVBUF = 6,
    SRTO_LINGER = 7,
    SRTO_RENDEZVOUS = 12,
    SRTO_SNDTIMEO = 13,
    SRTO_RCVTIMEO = 14,
    SRTO_REUSEADDR = 15,
    SRTO_MAXBW = 16,
    SRTO_STATE = 17,
    SRTO_EVENT = 18,
    SRTO_TSBPDMODE = 22,
    SRTO_LATENCY = 23,
    SRTO_INPUTBW = 24,
    SRTO_PASSPHRASE = 26,
    SRTO_PBKEYLEN = 27,
    SRTO_IPTTL = 29,
    SRTO_IPTOS = 30,
    SRTO_TLPKTDROP = 31,
    SRTO_RCVLATENCY = 34,
    SRTO_PEERLATENCY = 35,
    SRTO_MESSAGEAPI = 36,
    SRTO_PAYLOADSIZE = 37,
    SRTO_TRANSTYPE = 50,
    SRTO_PEERIDLETIMEO = 43,
    SRTO_PACKETFILTER = 60,
    SRTO_STREAMID = 46,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SRT_TRANSTYPE {
    SRTT_LIVE = 0,
    SRTT_FILE = 1,
    SRTT_INVALID = 2,
}

/// Bitflags reported by `srt_epoll_uwait`, matching `SRT_EPOLL_OPT`.
pub const SRT_EPOLL_IN: c_int = 0x1;
pub const SRT_EPOLL_OUT: c_int = 0x4;
pub const SRT_EPOLL_ERR: c_int = 0x8;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SRT_EPOLL_EVENT {
    pub fd: SRTSOCKET,
    pub events: c_int,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct sockaddr {
    pub sa_family: u16,
    pub sa_data: [u8; 14],
}

#[repr(C)]
#[derive(Debug, Clone, Default)]
pub struct SRT_TRACEBSTATS {
    pub ms_time_stamp: i64,
    pub pkt_sent_total: i64,
    pub pkt_recv_total: i64,
    pub pkt_sent_loss_total: i32,
    pub pkt_recv_loss_total: i32,
    pub pkt_retrans_total: i32,
    pub pkt_sent: i64,
    pub pkt_recv: i64,
    pub pkt_sent_loss: i32,
    pub pkt_recv_loss: i32,
    pub ms_rtt: f64,
    pub mbps_send_rate: f64,
    pub mbps_recv_rate: f64,
    pub pkt_flight_size: i32,
    pub byte_avail_snd_buf: i32,
    pub byte_avail_rcv_buf: i32,
}

#[cfg_attr(target_os = "windows", link(name = "srt"))]
#[cfg_attr(not(target_os = "windows"), link(name = "srt"))]
extern "C" {
    pub fn srt_startup() -> c_int;
    pub fn srt_cleanup() -> c_int;

    pub fn srt_create_socket() -> SRTSOCKET;
    pub fn srt_close(sock: SRTSOCKET) -> c_int;

    pub fn srt_bind(sock: SRTSOCKET, name: *const sockaddr, namelen: c_int) -> c_int;
    pub fn srt_listen(sock: SRTSOCKET, backlog: c_int) -> c_int;
    pub fn srt_accept(sock: SRTSOCKET, addr: *mut sockaddr, addrlen: *mut c_int) -> SRTSOCKET;
    pub fn srt_connect(sock: SRTSOCKET, name: *const sockaddr, namelen: c_int) -> c_int;

    pub fn srt_recv(sock: SRTSOCKET, buf: *mut c_char, len: c_int) -> c_int;
    pub fn srt_send(sock: SRTSOCKET, buf: *const c_char, len: c_int) -> c_int;

    pub fn srt_setsockflag(
        sock: SRTSOCKET,
        opt: SRT_SOCKOPT,
        optval: *const c_void,
        optlen: c_int,
    ) -> c_int;
    pub fn srt_getsockflag(
        sock: SRTSOCKET,
        opt: SRT_SOCKOPT,
        optval: *mut c_void,
        optlen: *mut c_int,
    ) -> c_int;

    pub fn srt_getsockstate(sock: SRTSOCKET) -> SRT_SOCKSTATUS;
    pub fn srt_getsockname(sock: SRTSOCKET, name: *mut sockaddr, namelen: *mut c_int) -> c_int;

    pub fn srt_bstats(sock: SRTSOCKET, perf: *mut SRT_TRACEBSTATS, clear: c_int) -> c_int;

    pub fn srt_epoll_create() -> SRT_EPOLL_T;
    pub fn srt_epoll_add_usock(eid: SRT_EPOLL_T, u: SRTSOCKET, events: *const c_int) -> c_int;
    pub fn srt_epoll_remove_usock(eid: SRT_EPOLL_T, u: SRTSOCKET) -> c_int;
    pub fn srt_epoll_uwait(
        eid: SRT_EPOLL_T,
        fdsSet: *mut SRT_EPOLL_EVENT,
        fdsSize: c_int,
        msTimeOut: i64,
    ) -> c_int;
    pub fn srt_epoll_release(eid: SRT_EPOLL_T) -> c_int;

    pub fn srt_setloglevel(ll: c_int);

    pub fn srt_getlasterror(errno_loc: *mut c_int) -> c_int;
    pub fn srt_getlasterror_str() -> *const c_char;
}
