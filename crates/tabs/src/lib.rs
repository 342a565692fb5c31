//! Echo Browsing Session Shell
//!
//! This crate owns the single browsing session Echo presents to the user:
//! URL interpretation, the session state store, navigation against the
//! sandboxed surface, the shortcut registry, and the two safety controls
//! (tab cloaking and the panic key).

pub mod cloak;
pub mod document;
pub mod navigation;
pub mod normalize;
pub mod panic;
pub mod sandbox;
pub mod session;
pub mod shortcuts;
pub mod state;

use thiserror::Error;

pub use cloak::{CloakIdentity, CloakProfile};
pub use document::{Document, HeadlessDocument};
pub use navigation::NavigationController;
pub use normalize::{normalize, normalize_address, normalize_search, InputSource, SearchEngine};
pub use panic::{KeyEvent, KeyOutcome};
pub use sandbox::{SandboxPolicy, SimulatedSurface, Surface, SurfaceError};
pub use session::BrowsingSession;
pub use shortcuts::{Provenance, Shortcut, ShortcutCategory, ShortcutRegistry};
pub use state::{RenderMode, SessionState, SessionStore, StateChange, StateObserver};

/// Errors that can occur during session operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShellError {
    #[error("Cross-origin access denied for {url}")]
    CrossOriginDenied { url: String },

    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceError),

    #[error("Invalid shortcut: {0}")]
    InvalidShortcut(String),

    #[error("No shortcut at index {0}")]
    UnknownShortcut(usize),

    #[error("Not in browsing mode")]
    NotBrowsing,
}

/// Result type for session operations
pub type ShellResult<T> = Result<T, ShellError>;
