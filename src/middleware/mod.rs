//! Request middleware: trailing-slash redirects and access logging.

pub mod access_log;
pub mod normalize;

pub use access_log::{log_request, resolve_client_ip, AccessLog};
pub use normalize::{redirect_target, strip_trailing_slash};
