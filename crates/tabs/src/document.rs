//! Top-level document the shell lives in.
//!
//! The shell never touches a real DOM directly. Everything it does to the
//! outer page (title, favicon, redirects, popups, notices) goes through the
//! [`Document`] trait so hosts can bind it to whatever surface they render.

use serde::{Deserialize, Serialize};

/// Side effects the shell performs on its own top-level page
pub trait Document: Send {
    /// Replace the page title
    fn set_title(&mut self, title: &str);

    /// Whether a `<link rel="icon">` element exists
    fn has_favicon(&self) -> bool;

    /// Create an empty favicon link element
    fn create_favicon(&mut self);

    /// Point the existing favicon link at `href`
    fn set_favicon_href(&mut self, href: &str);

    /// Full top-level navigation away from the shell
    fn redirect(&mut self, url: &str);

    /// Open `url` in a new top-level browsing context
    fn open_window(&mut self, url: &str);

    /// Show a blocking, human-readable notice
    fn notify(&mut self, message: &str);
}

/// In-memory document that records every effect.
///
/// Used by headless sessions and by tests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadlessDocument {
    pub title: String,
    pub favicon: Option<String>,
    pub redirected_to: Option<String>,
    pub opened_windows: Vec<String>,
    pub notices: Vec<String>,
}

impl HeadlessDocument {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Document for HeadlessDocument {
    fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    fn has_favicon(&self) -> bool {
        self.favicon.is_some()
    }

    fn create_favicon(&mut self) {
        self.favicon = Some(String::new());
    }

    fn set_favicon_href(&mut self, href: &str) {
        if let Some(favicon) = self.favicon.as_mut() {
            *favicon = href.to_string();
        }
    }

    fn redirect(&mut self, url: &str) {
        self.redirected_to = Some(url.to_string());
    }

    fn open_window(&mut self, url: &str) {
        self.opened_windows.push(url.to_string());
    }

    fn notify(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }
}
