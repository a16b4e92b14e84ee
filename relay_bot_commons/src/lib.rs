//! Things every bot in this workspace needs on startup and when looking
//! at incoming messages.

pub mod useful_methods;

use std::future::Future;

/// Initialize logging and run `closure` to completion in a multithreaded
/// async runtime.
///
/// Log filters are taken from the environment variable `RUST_LOG`, falling
/// back to `default_filter` when it is unset or not valid unicode. This uses
/// the crate [pretty_env_logger][] internally, see its documentation for
/// more details.
///
/// # Panics
///
/// Panics if the tokio runtime can't be built.
///
/// [pretty_env_logger]: https://docs.rs/pretty_env_logger
pub fn start_everything(default_filter: &str, closure: impl Future<Output = ()>) {
    let log_filter = std::env::var_os("RUST_LOG")
        .and_then(|x| x.into_string().ok())
        .unwrap_or_else(|| default_filter.to_string());

    // journald timestamps every line on its own.
    let running_as_systemd_service = std::env::var_os("JOURNAL_STREAM").is_some();

    let mut builder = match running_as_systemd_service {
        true => pretty_env_logger::formatted_builder(),
        false => pretty_env_logger::formatted_timed_builder(),
    };

    builder.parse_filters(&log_filter);

    if builder.try_init().is_err() {
        log::error!("Tried to init logger twice!");
    }

    log::info!("Logging initialized with filter \"{log_filter}\"");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build the tokio runtime!")
        .block_on(closure);
}
