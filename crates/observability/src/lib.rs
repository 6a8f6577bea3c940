//! Process-wide tracing setup shared by services and tests.

mod subscriber;

pub use subscriber::{init, init_for_tests, try_init, LogFormat, LogSettings, ObservabilityError};
