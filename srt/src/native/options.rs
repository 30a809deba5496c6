use std::{ffi::CString, fmt, mem::size_of};

use libc::c_int;

use super::ffi::{self, SRT_SOCKOPT, SRT_TRANSTYPE, SRTSOCKET};
use crate::error::{SrtError, SrtErrorKind};

/// Baseline connection tuning applied by [`crate::owner`] on `create()`,
/// before any caller-supplied [`SockOpt`]/[`OptValue`] pairs.
///
/// Defaults mirror live-streaming presets: small latency budget, message
/// boundaries preserved, payload capped to the conventional SRT MTU.
#[derive(Debug, Clone)]
pub struct SrtOptions {
    pub message_api: bool,
    pub payload_size: u32,
    pub max_bandwidth: i64,
    pub latency: u32,
    pub peer_idle_timeout: u32,
    pub fc: u32,
    pub mss: u32,
    pub stream_id: Option<String>,
}

impl Default for SrtOptions {
    fn default() -> Self {
        Self {
            message_api: true,
            payload_size: 1316,
            max_bandwidth: -1,
            latency: 120,
            peer_idle_timeout: 5000,
            fc: 25600,
            mss: 1500,
            stream_id: None,
        }
    }
}

impl SrtOptions {
    /// Expands the baseline tuning into `(option, value)` pairs, in the
    /// order [`crate::owner::SocketOwnerCore::create`] applies them
    /// through the facade. Kept separate from the fixed live-mode flags
    /// (transtype, TSBPD, packet drop) that every socket gets regardless
    /// of these settings.
    pub(crate) fn as_flags(&self) -> Vec<(SockOpt, OptValue)> {
        let mut flags = vec![
            (SockOpt::TRANSTYPE, OptValue::I32(SRT_TRANSTYPE::SRTT_LIVE as i32)),
            (SockOpt::RCVSYN, OptValue::Bool(false)),
            (SockOpt::SNDSYN, OptValue::Bool(false)),
            (SockOpt::TSBPDMODE, OptValue::Bool(true)),
            (SockOpt::TLPKTDROP, OptValue::Bool(true)),
            (SockOpt::MESSAGEAPI, OptValue::Bool(self.message_api)),
            (SockOpt::PAYLOADSIZE, OptValue::U32(self.payload_size)),
            (SockOpt::FC, OptValue::U32(self.fc)),
            (SockOpt::MSS, OptValue::U32(self.mss)),
            (SockOpt::RCVLATENCY, OptValue::U32(self.latency)),
            (SockOpt::MAXBW, OptValue::I64(self.max_bandwidth)),
            (SockOpt::PEERIDLETIMEO, OptValue::U32(self.peer_idle_timeout)),
        ];

        if let Some(stream_id) = &self.stream_id {
            flags.push((SockOpt::STREAMID, OptValue::Str(stream_id.clone())));
        }

        flags
    }

    /// Largest payload `write` can hand to the native layer in one call
    /// without the stream-id/header overhead pushing it past the wire MTU.
    pub const fn max_pkt_size(&self) -> usize {
        self.payload_size as usize
    }
}

/// One entry in the fixed option-identifier enumeration exposed to callers
/// of `set_socket_flags`/`get_sockopt` (see spec.md glossary: MESSAGEAPI,
/// RCVSYN, SNDSYN, PAYLOADSIZE, and the rest of the SRT option set).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum SockOpt {
    MESSAGEAPI,
    RCVSYN,
    SNDSYN,
    PAYLOADSIZE,
    LATENCY,
    RCVLATENCY,
    PEERLATENCY,
    MAXBW,
    FC,
    MSS,
    PEERIDLETIMEO,
    TSBPDMODE,
    TLPKTDROP,
    STREAMID,
    PASSPHRASE,
    TRANSTYPE,
}

impl SockOpt {
    fn native(self) -> SRT_SOCKOPT {
        match self {
            Self::MESSAGEAPI => SRT_SOCKOPT::SRTO_MESSAGEAPI,
            Self::RCVSYN => SRT_SOCKOPT::SRTO_RCVSYN,
            Self::SNDSYN => SRT_SOCKOPT::SRTO_SNDSYN,
            Self::PAYLOADSIZE => SRT_SOCKOPT::SRTO_PAYLOADSIZE,
            Self::LATENCY => SRT_SOCKOPT::SRTO_LATENCY,
            Self::RCVLATENCY => SRT_SOCKOPT::SRTO_RCVLATENCY,
            Self::PEERLATENCY => SRT_SOCKOPT::SRTO_PEERLATENCY,
            Self::MAXBW => SRT_SOCKOPT::SRTO_MAXBW,
            Self::FC => SRT_SOCKOPT::SRTO_FC,
            Self::MSS => SRT_SOCKOPT::SRTO_MSS,
            Self::PEERIDLETIMEO => SRT_SOCKOPT::SRTO_PEERIDLETIMEO,
            Self::TSBPDMODE => SRT_SOCKOPT::SRTO_TSBPDMODE,
            Self::TLPKTDROP => SRT_SOCKOPT::SRTO_TLPKTDROP,
            Self::STREAMID => SRT_SOCKOPT::SRTO_STREAMID,
            Self::PASSPHRASE => SRT_SOCKOPT::SRTO_PASSPHRASE,
            Self::TRANSTYPE => SRT_SOCKOPT::SRTO_TRANSTYPE,
        }
    }
}

/// A value for one [`SockOpt`], dispatched to the scalar or string native
/// setter depending on the variant carried.
#[derive(Debug, Clone)]
pub enum OptValue {
    Bool(bool),
    I32(i32),
    U32(u32),
    I64(i64),
    Str(String),
}

impl fmt::Display for OptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v}"),
        }
    }
}

/// Applies one `(option, value)` pair. Called once per element of the
/// caller's `set_socket_flags` batch; the caller is responsible for
/// submitting every element before awaiting any one result (see
/// [`crate::owner::SocketOwnerCore::set_socket_flags`]).
pub(crate) fn set_socket_flag(
    fd: SRTSOCKET,
    opt: SockOpt,
    value: &OptValue,
) -> Result<(), SrtError> {
    let native = opt.native();
    match value {
        OptValue::Bool(v) => set_sock_opt(fd, native, &(*v as i32)),
        OptValue::I32(v) => set_sock_opt(fd, native, v),
        OptValue::U32(v) => set_sock_opt(fd, native, v),
        OptValue::I64(v) => set_sock_opt(fd, native, v),
        OptValue::Str(v) => set_sock_opt_str(fd, native, v),
    }
}

fn set_sock_opt<T: Sized>(fd: SRTSOCKET, opt: SRT_SOCKOPT, flag: &T) -> Result<(), SrtError> {
    if unsafe {
        ffi::srt_setsockflag(
            fd,
            opt,
            flag as *const T as *const _,
            size_of::<T>() as c_int,
        )
    } == 0
    {
        Ok(())
    } else {
        SrtError::last(SrtErrorKind::SetOptError)
    }
}

fn set_sock_opt_str(fd: SRTSOCKET, opt: SRT_SOCKOPT, value: &str) -> Result<(), SrtError> {
    let cstr = CString::new(value).map_err(|_| SrtError::new(SrtErrorKind::SetOptError, None))?;
    if unsafe { ffi::srt_setsockflag(fd, opt, cstr.as_ptr() as *const _, value.len() as c_int) }
        == 0
    {
        Ok(())
    } else {
        SrtError::last(SrtErrorKind::SetOptError)
    }
}

pub(crate) fn get_sock_opt_str(fd: SRTSOCKET, opt: SockOpt) -> Option<String> {
    let mut buf = [0u8; 512];
    let mut len = buf.len() as c_int;
    if unsafe {
        ffi::srt_getsockflag(
            fd,
            opt.native(),
            buf.as_mut_ptr() as *mut _,
            &mut len as *mut c_int,
        )
    } == 0
    {
        std::str::from_utf8(&buf[..len.max(0) as usize])
            .ok()
            .map(|s| s.to_string())
    } else {
        None
    }
}
