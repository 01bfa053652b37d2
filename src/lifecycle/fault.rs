//! Fatal fault handling.
//!
//! Any panic, or any background task that finishes with an error nobody
//! handles, ends the process with exit code 1. The supervisor restarts it.

use std::any::Any;
use std::fmt;
use std::future::Future;

use tokio::task::JoinHandle;
use tracing::error;

/// Exit code for fatal faults and forced shutdowns.
pub const FAILURE_EXIT_CODE: i32 = 1;

/// A fault that terminates the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// A panic anywhere in the process.
    UncaughtPanic {
        /// Panic payload.
        message: String,
        /// `file:line:col`, when known.
        location: Option<String>,
    },
    /// A spawned task finished with an error.
    UnhandledTaskFailure {
        /// Task name given to [`spawn_supervised`].
        task: String,
        /// Rendered error.
        reason: String,
    },
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::UncaughtPanic {
                message,
                location: Some(location),
            } => write!(f, "Uncaught fault at {location}: {message}"),
            Fault::UncaughtPanic {
                message,
                location: None,
            } => write!(f, "Uncaught fault: {message}"),
            Fault::UnhandledTaskFailure { task, reason } => {
                write!(f, "Unhandled task failure in {task}: {reason}")
            }
        }
    }
}

/// Log the fault and exit with [`FAILURE_EXIT_CODE`].
pub fn fatal(fault: &Fault) -> ! {
    error!(fault = %fault, "Fatal fault, exiting");
    std::process::exit(FAILURE_EXIT_CODE);
}

/// Best-effort string form of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Make every panic fatal.
///
/// Installed once at startup, before the runtime spawns any task, so a panic
/// inside a request handler or a background task also ends the process.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let fault = Fault::UncaughtPanic {
            message: panic_message(info.payload()).to_string(),
            location: info
                .location()
                .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column())),
        };
        fatal(&fault);
    }));
}

/// Spawn a background task whose error is fatal.
pub fn spawn_supervised<F, E>(name: &'static str, fut: F) -> JoinHandle<()>
where
    F: Future<Output = Result<(), E>> + Send + 'static,
    E: fmt::Display,
{
    spawn_supervised_with(name, fut, |fault| {
        fatal(&fault);
    })
}

fn spawn_supervised_with<F, E, H>(name: &'static str, fut: F, on_fault: H) -> JoinHandle<()>
where
    F: Future<Output = Result<(), E>> + Send + 'static,
    E: fmt::Display,
    H: FnOnce(Fault) + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = fut.await {
            on_fault(Fault::UnhandledTaskFailure {
                task: name.to_string(),
                reason: e.to_string(),
            });
        }
    })
}
