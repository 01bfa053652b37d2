//! Process lifecycle: state machine, shutdown triggers, supervisor
//! integration and fatal fault handling.

pub mod fault;
pub mod shutdown;
pub mod state;
pub mod supervisor;

pub use fault::{install_panic_hook, spawn_supervised, Fault, FAILURE_EXIT_CODE};
pub use shutdown::{wait_for_shutdown, ShutdownReason, ShutdownSignals};
pub use state::{Lifecycle, LifecycleState};
pub use supervisor::{ControlMessage, Supervisor};
