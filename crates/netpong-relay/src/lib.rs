pub mod config;
pub mod console;
pub mod intercept_log;
pub mod policy;
pub mod relay;

pub use relay::{RelayState, build_app};
