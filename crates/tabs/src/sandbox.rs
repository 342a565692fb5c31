//! The sandboxed content surface.
//!
//! The shell treats the frame it browses in as a capability-limited peer: it
//! can point it somewhere, but history access and script injection only work
//! while the framed document shares the shell's origin.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::{Origin, Url};

/// Maximum number of history entries kept per surface
const MAX_HISTORY_ENTRIES: usize = 100;

/// Why the surface refused an operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    /// The framed document is not same-origin with the shell
    #[error("access to {url} denied by cross-origin isolation")]
    CrossOriginDenied { url: String },

    /// The sandbox policy does not allow scripts
    #[error("scripts are disabled by the sandbox policy")]
    ScriptsBlocked,
}

/// Operations the shell can issue against the sandbox frame
pub trait Surface: Send {
    /// Point the frame at `url`
    fn load(&mut self, url: &str);

    /// Tear the frame down; its history goes with it
    fn unload(&mut self);

    /// The URL the frame was last pointed at, if any
    fn current_url(&self) -> Option<String>;

    /// Ask the framed document to go back in its own history
    fn history_back(&mut self) -> Result<(), SurfaceError>;

    /// Ask the framed document to go forward in its own history
    fn history_forward(&mut self) -> Result<(), SurfaceError>;

    /// Append an inline script to the framed document's body
    fn inject_script(&mut self, source: &str) -> Result<(), SurfaceError>;
}

/// Restrictions applied to the sandbox frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxPolicy {
    pub allow_same_origin: bool,
    pub allow_scripts: bool,
    pub allow_forms: bool,
    pub allow_popups: bool,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self {
            allow_same_origin: true,
            allow_scripts: true,
            allow_forms: true,
            allow_popups: true,
        }
    }
}

impl SandboxPolicy {
    /// Value for the frame's `sandbox` attribute
    pub fn attribute(&self) -> String {
        let tokens = [
            (self.allow_same_origin, "allow-same-origin"),
            (self.allow_scripts, "allow-scripts"),
            (self.allow_forms, "allow-forms"),
            (self.allow_popups, "allow-popups"),
        ];
        tokens
            .iter()
            .filter(|(enabled, _)| *enabled)
            .map(|(_, token)| *token)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Back/forward stack of a single frame
#[derive(Debug, Clone, Default)]
pub struct FrameHistory {
    entries: VecDeque<String>,
    current_index: usize,
}

impl FrameHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a navigation. Forward entries are dropped; navigating to the
    /// current entry again is a no-op.
    pub fn push(&mut self, url: &str) {
        if self.current() == Some(url) {
            return;
        }

        while self.entries.len() > self.current_index + 1 {
            self.entries.pop_back();
        }

        self.entries.push_back(url.to_string());
        self.current_index = self.entries.len() - 1;

        if self.entries.len() > MAX_HISTORY_ENTRIES {
            self.entries.pop_front();
            self.current_index -= 1;
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.entries.get(self.current_index).map(String::as_str)
    }

    pub fn go_back(&mut self) -> Option<&str> {
        if self.can_go_back() {
            self.current_index -= 1;
            self.current()
        } else {
            None
        }
    }

    pub fn go_forward(&mut self) -> Option<&str> {
        if self.can_go_forward() {
            self.current_index += 1;
            self.current()
        } else {
            None
        }
    }

    pub fn can_go_back(&self) -> bool {
        self.current_index > 0
    }

    pub fn can_go_forward(&self) -> bool {
        self.current_index + 1 < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Headless stand-in for the sandbox frame.
///
/// Keeps its own history and enforces the same-origin gate the way a browser
/// would for a parent document reaching into an iframe.
#[derive(Debug, Clone)]
pub struct SimulatedSurface {
    shell_origin: Origin,
    policy: SandboxPolicy,
    src: Option<String>,
    history: FrameHistory,
    injected: Vec<String>,
    load_count: u64,
}

impl SimulatedSurface {
    /// Create a surface embedded in a shell served from `shell_url`
    pub fn new(shell_url: &Url, policy: SandboxPolicy) -> Self {
        Self {
            shell_origin: shell_url.origin(),
            policy,
            src: None,
            history: FrameHistory::new(),
            injected: Vec::new(),
            load_count: 0,
        }
    }

    /// URL of the document currently shown, which differs from `src` after
    /// back/forward
    pub fn location(&self) -> Option<&str> {
        self.history.current()
    }

    pub fn history(&self) -> &FrameHistory {
        &self.history
    }

    /// Scripts injected so far
    pub fn injected_scripts(&self) -> &[String] {
        &self.injected
    }

    /// Number of load requests received
    pub fn load_count(&self) -> u64 {
        self.load_count
    }

    fn check_access(&self) -> Result<(), SurfaceError> {
        let location = self.location().unwrap_or("about:blank");
        let same_origin = self.policy.allow_same_origin
            && Url::parse(location)
                .map(|url| url.origin() == self.shell_origin)
                .unwrap_or(false);

        if same_origin {
            Ok(())
        } else {
            Err(SurfaceError::CrossOriginDenied {
                url: location.to_string(),
            })
        }
    }
}

impl Surface for SimulatedSurface {
    fn load(&mut self, url: &str) {
        self.load_count += 1;
        self.src = Some(url.to_string());
        self.history.push(url);
    }

    fn unload(&mut self) {
        self.src = None;
        self.history = FrameHistory::new();
        self.injected.clear();
    }

    fn current_url(&self) -> Option<String> {
        self.src.clone()
    }

    fn history_back(&mut self) -> Result<(), SurfaceError> {
        self.check_access()?;
        self.history.go_back();
        Ok(())
    }

    fn history_forward(&mut self) -> Result<(), SurfaceError> {
        self.check_access()?;
        self.history.go_forward();
        Ok(())
    }

    fn inject_script(&mut self, source: &str) -> Result<(), SurfaceError> {
        self.check_access()?;
        if !self.policy.allow_scripts {
            return Err(SurfaceError::ScriptsBlocked);
        }
        self.injected.push(source.to_string());
        Ok(())
    }
}
