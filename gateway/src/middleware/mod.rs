// gateway/src/middleware/mod.rs
pub mod request_log;

pub use request_log::RequestLog;
