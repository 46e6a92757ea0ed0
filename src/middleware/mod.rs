mod error_handler;
mod rate_limit;
mod request_context;

pub use error_handler::log_errors;
pub use rate_limit::{AdmissionFilter, rate_limit};
pub use request_context::RequestContext;
