//! Panic key handling.
//!
//! One global keyboard stream feeds two behaviours. While capture is armed the
//! next key becomes the new panic key and is swallowed. Otherwise a key equal
//! to the panic key sends the whole page to the panic target.

use serde::{Deserialize, Serialize};

use crate::state::SessionStore;

/// A keydown as seen by the window-level listener
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// Key token, e.g. `` ` ``, `Escape`, `F9`
    pub key: String,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// What the listener did with a key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum KeyOutcome {
    /// Consumed as the new panic key; must not reach anything else
    Captured { key: String },
    /// Matched the panic key; the page must redirect to `target`
    Panic { target: String },
    /// Not ours, let it through
    Passed,
}

/// Run one key event through capture and panic matching.
///
/// Capture is checked first, so a captured key never also fires the panic
/// redirect, even when it equals the previous panic key. Empty key tokens are
/// ignored while capture is armed and capture stays armed.
pub fn process_key(store: &mut SessionStore, event: &KeyEvent) -> KeyOutcome {
    if store.state().is_capturing_key {
        if event.key.is_empty() {
            return KeyOutcome::Passed;
        }
        log::info!("Panic key bound to '{}'", event.key);
        store.set_panic_key(event.key.clone());
        store.set_capturing_key(false);
        return KeyOutcome::Captured {
            key: event.key.clone(),
        };
    }

    let state = store.state();
    if !state.panic_key.is_empty() && event.key == state.panic_key {
        log::warn!("Panic key pressed, leaving for {}", state.panic_target);
        return KeyOutcome::Panic {
            target: state.panic_target.clone(),
        };
    }

    KeyOutcome::Passed
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_panic_key_redirects() {
        let mut store = SessionStore::new();
        let outcome = process_key(&mut store, &KeyEvent::new("`"));
        assert_eq!(
            outcome,
            KeyOutcome::Panic {
                target: "https://google.com".into()
            }
        );
    }

    #[test]
    fn test_other_keys_pass() {
        let mut store = SessionStore::new();
        assert_eq!(process_key(&mut store, &KeyEvent::new("a")), KeyOutcome::Passed);
        assert_eq!(process_key(&mut store, &KeyEvent::new("`a")), KeyOutcome::Passed);
    }

    #[test]
    fn test_capture_swallows_previous_panic_key() {
        let mut store = SessionStore::new();
        store.set_capturing_key(true);

        let outcome = process_key(&mut store, &KeyEvent::new("`"));

        assert_eq!(outcome, KeyOutcome::Captured { key: "`".into() });
        assert!(!store.state().is_capturing_key);
    }

    #[test]
    fn test_capture_rebinds_then_new_key_fires() {
        let mut store = SessionStore::new();
        store.set_panic_target("https://classroom.google.com");
        store.set_capturing_key(true);

        process_key(&mut store, &KeyEvent::new("Escape"));
        assert_eq!(store.state().panic_key, "Escape");

        assert_eq!(process_key(&mut store, &KeyEvent::new("`")), KeyOutcome::Passed);
        assert_eq!(
            process_key(&mut store, &KeyEvent::new("Escape")),
            KeyOutcome::Panic {
                target: "https://classroom.google.com".into()
            }
        );
    }

    #[test]
    fn test_empty_key_keeps_capture_armed() {
        let mut store = SessionStore::new();
        store.set_capturing_key(true);

        assert_eq!(process_key(&mut store, &KeyEvent::new("")), KeyOutcome::Passed);
        assert!(store.state().is_capturing_key);
        assert_eq!(store.state().panic_key, "`");
    }

    #[test]
    fn test_outcome_wire_shape() {
        let panic = KeyOutcome::Panic {
            target: "https://google.com".into(),
        };
        assert_eq!(
            serde_json::to_value(&panic).unwrap(),
            serde_json::json!({"outcome": "panic", "target": "https://google.com"})
        );
        assert_eq!(
            serde_json::to_value(&KeyOutcome::Passed).unwrap(),
            serde_json::json!({"outcome": "passed"})
        );
    }
}
