//! C4 - Socket Owner.
//!
//! The lifecycle shared by every object that owns exactly one SRT socket
//! handle: `None -> Created -> Open -> Disposed`, forward-only, disposed
//! terminal. [`crate::server::Server`] embeds this core and supplies its
//! own `open()` sequence (bind/listen/epoll-create); a plain client
//! connection could embed the same core with a `connect()` sequence.

use std::net::SocketAddr;

use crate::{
    error::FacadeError,
    facade::Facade,
    native::{OptValue, SockOpt, SrtOptions, SRTSOCKET},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerState {
    None,
    Created,
    Open,
    Disposed,
}

/// Lifecycle events an owner fires as it moves through its states.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    Created,
    Opened,
    Disposed,
}

/// The part of C4 that is identical across every socket-owning object:
/// state tracking, option application, and disposal. Embedded by
/// [`crate::server::Server`] via composition rather than inheritance.
pub struct SocketOwnerCore {
    facade: Facade,
    state: OwnerState,
    fd: Option<SRTSOCKET>,
    options: SrtOptions,
}

impl SocketOwnerCore {
    pub fn new(facade: Facade, options: SrtOptions) -> Self {
        Self {
            facade,
            state: OwnerState::None,
            fd: None,
            options,
        }
    }

    pub fn state(&self) -> OwnerState {
        self.state
    }

    pub fn fd(&self) -> Option<SRTSOCKET> {
        self.fd
    }

    pub fn facade(&self) -> &Facade {
        &self.facade
    }

    /// Requires `None`. Asks the facade for a socket, applies the
    /// baseline [`SrtOptions`], and transitions to `Created`. A second
    /// call is a caller error.
    pub async fn create(&mut self) -> Result<SRTSOCKET, FacadeError> {
        if self.state != OwnerState::None {
            return Err(FacadeError::State(format!(
                "create() called in state {:?}, expected None",
                self.state
            )));
        }

        let fd = self.facade.create_socket().await?;

        for (opt, value) in self.options.as_flags() {
            let _ = self.facade.set_sockopt(fd, opt, value).await?;
        }

        self.fd = Some(fd);
        self.state = OwnerState::Created;
        Ok(fd)
    }

    /// Permitted only between `Created` and `Open`. Submits every option
    /// before awaiting any one result and returns the per-option outcomes
    /// in the caller's order.
    pub async fn set_socket_flags(
        &self,
        options: Vec<(SockOpt, OptValue)>,
    ) -> Result<Vec<Result<bool, FacadeError>>, FacadeError> {
        let fd = self.require_fd()?;
        if !matches!(self.state, OwnerState::Created | OwnerState::Open) {
            return Err(FacadeError::State(format!(
                "set_socket_flags() called in state {:?}",
                self.state
            )));
        }

        self.facade.set_socket_flags(fd, options).await
    }

    /// Called by the subclass-specific `open()` once its sequence
    /// succeeds.
    pub fn mark_open(&mut self) -> Result<(), FacadeError> {
        if self.state != OwnerState::Created {
            return Err(FacadeError::State(format!(
                "open() called in state {:?}, expected Created",
                self.state
            )));
        }

        self.state = OwnerState::Open;
        Ok(())
    }

    /// Closes the socket if present, disposes the facade, and marks the
    /// owner terminal. Idempotent: safe to call again after a partial
    /// failure.
    pub async fn dispose(&mut self) {
        if self.state == OwnerState::Disposed {
            return;
        }

        if let Some(fd) = self.fd.take() {
            if let Err(e) = self.facade.close(fd).await {
                log::warn!("socket owner close failed during dispose: {e}");
            }
        }

        self.facade.dispose();
        self.state = OwnerState::Disposed;
    }

    fn require_fd(&self) -> Result<SRTSOCKET, FacadeError> {
        self.fd
            .ok_or_else(|| FacadeError::State("no socket created yet".to_string()))
    }
}

/// Address a [`crate::server::Server`] opens against; kept here since both
/// the owner core and the server need it.
pub type BindAddr = SocketAddr;

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
    async fn create_transitions_none_to_created() {
        ensure_startup();
        let facade = Facade::spawn("owner-test-create");
        let mut core = SocketOwnerCore::new(facade, SrtOptions::default());

        assert_eq!(core.state(), OwnerState::None);
        core.create().await.expect("create should succeed");
        assert_eq!(core.state(), OwnerState::Created);
        assert!(core.fd().is_some());

        core.dispose().await;
    }

    #[tokio::test]
    async fn double_create_is_a_caller_error() {
        ensure_startup();
        let facade = Facade::spawn("owner-test-double-create");
        let mut core = SocketOwnerCore::new(facade, SrtOptions::default());

        core.create().await.expect("first create should succeed");
        let second = core.create().await;
        assert!(matches!(second, Err(FacadeError::State(_))));

        core.dispose().await;
    }

    #[tokio::test]
    async fn mark_open_requires_created_state() {
        ensure_startup();
        let facade = Facade::spawn("owner-test-mark-open");
        let mut core = SocketOwnerCore::new(facade, SrtOptions::default());

        assert!(matches!(core.mark_open(), Err(FacadeError::State(_))));

        core.create().await.expect("create should succeed");
        core.mark_open().expect("mark_open should succeed once created");
        assert_eq!(core.state(), OwnerState::Open);

        core.dispose().await;
    }

    #[tokio::test]
    async fn dispose_is_idempotent_and_terminal() {
        ensure_startup();
        let facade = Facade::spawn("owner-test-dispose");
        let mut core = SocketOwnerCore::new(facade, SrtOptions::default());

        core.create().await.expect("create should succeed");
        core.dispose().await;
        assert_eq!(core.state(), OwnerState::Disposed);

        // A second dispose must not panic or touch an already-closed fd.
        core.dispose().await;
        assert_eq!(core.state(), OwnerState::Disposed);
    }
}
