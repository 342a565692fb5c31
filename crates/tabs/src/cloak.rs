//! Tab cloaking: disguising the shell's title and favicon.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::state::{SessionState, StateChange, StateObserver};

/// Known identities the shell can present
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloakIdentity {
    /// The shell's own branding
    #[default]
    None,
    Google,
    Drive,
    Classroom,
}

/// Title and icon shown for an identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CloakProfile {
    pub title: &'static str,
    pub icon: &'static str,
}

impl CloakIdentity {
    /// All identities in menu order
    pub const ALL: [CloakIdentity; 4] = [
        CloakIdentity::None,
        CloakIdentity::Google,
        CloakIdentity::Drive,
        CloakIdentity::Classroom,
    ];

    /// Resolve an identifier, falling back to [`CloakIdentity::None`] for unknown ids
    pub fn from_id(id: &str) -> Self {
        id.parse().unwrap_or_default()
    }

    /// Stable identifier used in settings and the JSON API
    pub fn id(self) -> &'static str {
        match self {
            CloakIdentity::None => "none",
            CloakIdentity::Google => "google",
            CloakIdentity::Drive => "drive",
            CloakIdentity::Classroom => "classroom",
        }
    }

    pub fn profile(self) -> CloakProfile {
        match self {
            CloakIdentity::None => CloakProfile {
                title: "Echo V4",
                icon: "/vite.svg",
            },
            CloakIdentity::Google => CloakProfile {
                title: "Google",
                icon: "https://www.google.com/favicon.ico",
            },
            CloakIdentity::Drive => CloakProfile {
                title: "My Drive - Google Drive",
                icon: "https://ssl.gstatic.com/docs/doclist/images/drive_2022q3_32dp.png",
            },
            CloakIdentity::Classroom => CloakProfile {
                title: "Classes",
                icon: "https://www.gstatic.com/classroom/favicon.png",
            },
        }
    }
}

impl fmt::Display for CloakIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Error returned when parsing an unrecognised identity id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCloak(pub String);

impl FromStr for CloakIdentity {
    type Err = UnknownCloak;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CloakIdentity::ALL
            .into_iter()
            .find(|identity| identity.id() == s)
            .ok_or_else(|| UnknownCloak(s.to_string()))
    }
}

/// Apply an identity's title and icon to the document.
///
/// Creates the favicon element if the page has none.
pub fn apply_cloak(document: &mut dyn Document, identity: CloakIdentity) {
    let profile = identity.profile();
    document.set_title(profile.title);
    if !document.has_favicon() {
        document.create_favicon();
    }
    document.set_favicon_href(profile.icon);
}

/// Observer that re-applies the cloak whenever the identity changes
pub struct CloakEffect<D: Document> {
    document: Arc<Mutex<D>>,
}

impl<D: Document> CloakEffect<D> {
    pub fn new(document: Arc<Mutex<D>>) -> Self {
        Self { document }
    }
}

impl<D: Document> StateObserver for CloakEffect<D> {
    fn on_change(&mut self, change: &StateChange, state: &SessionState) {
        if *change == StateChange::CloakIdentity {
            log::debug!("Applying cloak identity '{}'", state.cloak_identity);
            apply_cloak(&mut *self.document.lock(), state.cloak_identity);
        }
    }
}
