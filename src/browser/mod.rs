//! Browser infrastructure: launching Chrome and driving a single page

mod chrome;
mod driver;
mod session;
mod wrapper;

pub use crate::browser_setup::{download_managed_browser, find_browser_executable};
pub use chrome::ChromePage;
pub use driver::{DriverError, PageDriver, RawLink};
pub use session::{
    BrowserSession, ChromeSession, RELEASE_ORDER, ReleaseFailure, ReleaseReport, SessionResources,
    release_all,
};
pub use wrapper::{BrowserWrapper, launch_browser};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Failed to prepare browser profile: {0}")]
    ProfileSetup(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for BrowserError {
    fn from(err: std::io::Error) -> Self {
        BrowserError::IoError(err.to_string())
    }
}

pub type BrowserResult<T> = Result<T, BrowserError>;
