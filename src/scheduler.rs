pub(crate) mod accounts;
pub mod limiter;
pub mod range;
pub mod task;
