pub mod error;
pub mod logging;
pub mod poll;
pub mod relay;
