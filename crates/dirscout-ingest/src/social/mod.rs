//! Social-profile discovery collaborators
//!
//! A [`BrowserSession`] loads an entity's website and reports the outcome as
//! a tagged [`Navigation`]; a [`WebSearch`] backs the fallback lookup. The
//! [`links`] helpers pick the profile URL out of either result.

pub mod browser;
pub mod links;
pub mod search;

pub use browser::{BrowserLauncher, BrowserSession, HttpBrowser, Navigation, Page};
pub use search::{DuckDuckGoSearch, WebSearch};
