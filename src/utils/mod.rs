// Shared helpers used by the pipeline stages
mod clock;
pub mod constants;
mod errors;
mod timeout;
mod wait_for_element;

pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::ConfigError;
pub use timeout::{validate_navigation_timeout, validate_wait_timeout};
pub use wait_for_element::{WaitOutcome, wait_for_visible};
