//! Built-in event listeners
//!
//! - [`LoggingListener`]: writes every event to `tracing`
//! - [`MockEventListener`]: captures events for assertions in tests

pub mod logging;
pub mod mock_listener;

pub use logging::LoggingListener;
pub use mock_listener::MockEventListener;
