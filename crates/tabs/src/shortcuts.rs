//! Launchable destinations shown on the home chrome.
//!
//! Built-in entries are fixed at startup. User entries are appended in order
//! and live only as long as the session.

use serde::{Deserialize, Serialize};

use crate::normalize::normalize_address;
use crate::{ShellError, ShellResult};

/// Section a shortcut is listed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortcutCategory {
    /// Quick apps on the home page
    General,
    /// Games tab
    Arcade,
    /// Added by the user during this session
    Custom,
}

/// Where a shortcut came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    BuiltIn,
    User,
}

/// A named destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortcut {
    pub name: String,
    pub url: String,
    pub icon: Option<String>,
    pub category: ShortcutCategory,
    pub provenance: Provenance,
}

impl Shortcut {
    fn builtin(name: &str, url: &str, icon: Option<&str>, category: ShortcutCategory) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            icon: icon.map(str::to_string),
            category,
            provenance: Provenance::BuiltIn,
        }
    }
}

const QUICK_APPS: &[(&str, &str, &str)] = &[
    ("TikTok", "https://www.tiktok.com", "https://cdn-icons-png.flaticon.com/512/3046/3046121.png"),
    ("Discord", "https://discord.com/app", "https://cdn-icons-png.flaticon.com/512/5968/5968756.png"),
    ("YouTube", "https://www.youtube.com", "https://cdn-icons-png.flaticon.com/512/1384/1384060.png"),
    ("Twitter", "https://twitter.com", "https://cdn-icons-png.flaticon.com/512/733/733579.png"),
    ("Twitch", "https://twitch.tv", "https://cdn-icons-png.flaticon.com/512/5968/5968819.png"),
    ("Instagram", "https://instagram.com", "https://cdn-icons-png.flaticon.com/512/174/174855.png"),
    (
        "Fortnite",
        "https://www.xbox.com/en-US/play/games/fortnite/BT5P2X999VH2",
        "https://cdn-icons-png.flaticon.com/512/10300/10300438.png",
    ),
    ("GeForce Now", "https://play.geforcenow.com", "https://cdn-icons-png.flaticon.com/512/882/882731.png"),
    ("Google", "https://www.google.com/webhp?igu=1", "https://cdn-icons-png.flaticon.com/512/2991/2991148.png"),
    ("Movies", "https://bcine.app", "https://cdn-icons-png.flaticon.com/512/3163/3163478.png"),
];

const ARCADE: &[(&str, &str)] = &[
    ("Poki Games", "https://poki.com"),
    ("GN Math", "https://gn-math.dev"),
    ("now.gg", "https://now.gg"),
    ("2048", "https://play2048.co/"),
    ("Flappy Bird", "https://flappybird.io/"),
    ("Pac-Man", "https://freepacman.org/"),
    ("Tetris", "https://tetris.com/play-tetris"),
    ("Minecraft", "https://eaglercrafthub.com"),
    ("Slope", "https://slopegame.online/"),
];

/// Ordered union of built-in and user shortcuts
#[derive(Debug, Clone)]
pub struct ShortcutRegistry {
    builtin: Vec<Shortcut>,
    user: Vec<Shortcut>,
}

impl Default for ShortcutRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ShortcutRegistry {
    /// Registry with the stock general and arcade entries
    pub fn new() -> Self {
        let general = QUICK_APPS
            .iter()
            .map(|(name, url, icon)| Shortcut::builtin(name, url, Some(*icon), ShortcutCategory::General));
        let arcade = ARCADE
            .iter()
            .map(|(name, url)| Shortcut::builtin(name, url, None, ShortcutCategory::Arcade));

        Self::with_builtins(general.chain(arcade).collect())
    }

    /// Registry with a caller-supplied built-in set
    pub fn with_builtins(builtin: Vec<Shortcut>) -> Self {
        Self {
            builtin,
            user: Vec::new(),
        }
    }

    /// Append a user shortcut.
    ///
    /// Name and URL must be non-empty after trimming. Schemeless URLs get
    /// `https://`. Duplicates are kept.
    pub fn add(&mut self, name: &str, url: &str) -> ShellResult<&Shortcut> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ShellError::InvalidShortcut("name must not be empty".into()));
        }
        let url = normalize_address(url)
            .ok_or_else(|| ShellError::InvalidShortcut("url must not be empty".into()))?;

        log::info!("Adding shortcut '{}' -> {}", name, url);
        self.user.push(Shortcut {
            name: name.to_string(),
            url,
            icon: None,
            category: ShortcutCategory::Custom,
            provenance: Provenance::User,
        });
        Ok(&self.user[self.user.len() - 1])
    }

    /// All entries, built-ins first
    pub fn entries(&self) -> impl Iterator<Item = &Shortcut> {
        self.builtin.iter().chain(self.user.iter())
    }

    /// Entry at `index` in [`entries`](Self::entries) order
    pub fn get(&self, index: usize) -> Option<&Shortcut> {
        self.entries().nth(index)
    }

    pub fn by_category(&self, category: ShortcutCategory) -> impl Iterator<Item = &Shortcut> {
        self.entries().filter(move |s| s.category == category)
    }

    pub fn builtins(&self) -> &[Shortcut] {
        &self.builtin
    }

    pub fn user_entries(&self) -> &[Shortcut] {
        &self.user
    }

    pub fn len(&self) -> usize {
        self.builtin.len() + self.user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
