//! Browser automation boundary: the session capability trait and its
//! chromiumoxide implementation.

pub mod chromium;
pub mod launcher;
pub mod session;

pub use chromium::ChromiumSession;
pub use launcher::{BinarySource, BrowserBinary, LaunchOptions, launch_browser, locate_browser};
pub use session::{BrowserSession, ElementHandle};
