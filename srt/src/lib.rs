//! An asynchronous wrapper around the SRT streaming protocol.
//!
//! Turns SRT's synchronous, blocking C API into a non-blocking,
//! event-driven connection abstraction usable from a single-threaded
//! host runtime without stalling it. See [`server::Server`] for the
//! listening side and [`facade::Facade`] for the low-level async API
//! everything else is built on.

pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod facade;
pub mod io;
pub mod native;
pub mod owner;
pub mod runner;
pub mod server;

pub use config::Config;
pub use connection::{Connection, ConnectionEvent};
pub use error::{FacadeError, SrtError, SrtErrorKind};
pub use facade::Facade;
pub use io::{ChunkedIo, WritePacing};
pub use native::{OptValue, SockOpt, SrtOptions};
pub use owner::OwnerState;
pub use server::{Server, ServerConfig, ServerEvent};

/// Process-wide, idempotent initializer. Safe to call from multiple
/// [`Facade`]s; the native library tracks its own reference count, so
/// repeated calls are harmless.
pub fn startup() -> Result<(), SrtError> {
    native::startup()
}

/// Process-wide teardown. Only call once nothing is left using any
/// [`Server`] or [`Connection`].
pub fn shutdown() {
    native::cleanup();
}

/// Convenience wrapper around [`utils::logger::init`] for host processes
/// embedding this crate that want the same logger setup used elsewhere
/// in this workspace, rather than wiring their own `log` backend. Purely
/// optional - every native call already logs through the plain `log`
/// facade macros regardless of whether this is ever called.
pub fn init_logging(
    level: log::LevelFilter,
    path: Option<&str>,
) -> Result<(), utils::logger::LoggerInitError> {
    utils::logger::init(level, path)
}

/// Brings up a [`Server`] from a [`Config`]: spawns its [`Facade`],
/// creates the listener socket, and drives it through `bind`/`listen`
/// so the returned handle is immediately ready to accept connections.
pub async fn listen(config: Config) -> Result<std::sync::Arc<Server>, FacadeError> {
    let thread_name = format!("srt-server-{}", config.port);
    let log_level = config.log_level;
    let server_config = config.into_server_config()?;

    let facade = Facade::spawn(thread_name);
    facade.set_log_level(log_level).await?;

    let server = Server::new(facade, server_config);
    server.create().await?;
    server.open().await?;
    Ok(server)
}
