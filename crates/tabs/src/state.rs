//! Session state store.
//!
//! A single in-memory record for the one browsing session. Every mutation is
//! visible immediately and is followed by a synchronous dispatch to the
//! registered observers, in registration order.

use serde::{Deserialize, Serialize};

use crate::cloak::CloakIdentity;

/// Default destination for the panic key
pub const DEFAULT_PANIC_TARGET: &str = "https://google.com";

/// Default panic key token
pub const DEFAULT_PANIC_KEY: &str = "`";

/// Which of the two top-level views is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Search home, shortcuts and settings
    Chrome,
    /// The sandbox surface with the navigation bar
    Browsing,
}

/// Field that changed in the last mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    CurrentTarget,
    AddressDraft,
    CloakIdentity,
    PanicKey,
    PanicTarget,
    CapturingKey,
}

/// Session-wide UI state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Last submitted target, `None` while on the home chrome
    pub current_target: Option<String>,
    /// Text currently in the address bar
    pub address_draft: String,
    /// Active cloak
    pub cloak_identity: CloakIdentity,
    /// Where the panic key sends the user
    pub panic_target: String,
    /// Key token that triggers the panic redirect
    pub panic_key: String,
    /// Whether the next keystroke will be captured as the new panic key
    pub is_capturing_key: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            current_target: None,
            address_draft: String::new(),
            cloak_identity: CloakIdentity::None,
            panic_target: DEFAULT_PANIC_TARGET.to_string(),
            panic_key: DEFAULT_PANIC_KEY.to_string(),
            is_capturing_key: false,
        }
    }
}

impl SessionState {
    pub fn render_mode(&self) -> RenderMode {
        if self.current_target.is_some() {
            RenderMode::Browsing
        } else {
            RenderMode::Chrome
        }
    }
}

/// Callback run after each store mutation
pub trait StateObserver: Send {
    fn on_change(&mut self, change: &StateChange, state: &SessionState);
}

impl<F> StateObserver for F
where
    F: FnMut(&StateChange, &SessionState) + Send,
{
    fn on_change(&mut self, change: &StateChange, state: &SessionState) {
        self(change, state)
    }
}

/// Handle returned by [`SessionStore::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Owner of [`SessionState`] and its observers
pub struct SessionStore {
    state: SessionState,
    observers: Vec<(ObserverId, Box<dyn StateObserver>)>,
    next_observer: u64,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_state(SessionState::default())
    }

    pub fn with_state(state: SessionState) -> Self {
        Self {
            state,
            observers: Vec::new(),
            next_observer: 0,
        }
    }

    /// Current state
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Register an observer; it runs after every later mutation
    pub fn subscribe<O: StateObserver + 'static>(&mut self, observer: O) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Remove an observer. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer_id, _)| *observer_id != id);
        self.observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Set or clear the browsing target.
    ///
    /// A non-empty target enters browsing mode and mirrors the URL into the
    /// address bar. `None` or an empty string returns to the chrome and
    /// discards any address-bar draft.
    pub fn set_current_target(&mut self, target: Option<String>) {
        let target = target.filter(|url| !url.is_empty());
        match &target {
            Some(url) => {
                log::debug!("Entering browsing mode at {}", url);
                self.state.address_draft = url.clone();
            }
            None => {
                log::debug!("Returning to home chrome");
                self.state.address_draft.clear();
            }
        }
        self.state.current_target = target;
        self.notify(StateChange::CurrentTarget);
    }

    /// Replace the address-bar text without navigating
    pub fn set_address_draft(&mut self, draft: impl Into<String>) {
        self.state.address_draft = draft.into();
        self.notify(StateChange::AddressDraft);
    }

    /// Select a cloak by id; unknown ids resolve to [`CloakIdentity::None`]
    pub fn set_cloak_identity(&mut self, id: &str) -> CloakIdentity {
        let identity = CloakIdentity::from_id(id);
        if identity == CloakIdentity::None && id != CloakIdentity::None.id() {
            log::warn!("Unknown cloak identity '{}', using default", id);
        }
        self.set_cloak(identity);
        identity
    }

    pub fn set_cloak(&mut self, identity: CloakIdentity) {
        self.state.cloak_identity = identity;
        self.notify(StateChange::CloakIdentity);
    }

    pub fn set_panic_key(&mut self, key: impl Into<String>) {
        self.state.panic_key = key.into();
        self.notify(StateChange::PanicKey);
    }

    pub fn set_panic_target(&mut self, target: impl Into<String>) {
        self.state.panic_target = target.into();
        self.notify(StateChange::PanicTarget);
    }

    /// Arm or disarm panic key capture
    pub fn set_capturing_key(&mut self, capturing: bool) {
        self.state.is_capturing_key = capturing;
        self.notify(StateChange::CapturingKey);
    }

    fn notify(&mut self, change: StateChange) {
        for (_, observer) in self.observers.iter_mut() {
            observer.on_change(&change, &self.state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn test_default_state() {
        let store = SessionStore::new();
        let state = store.state();
        assert_eq!(state.current_target, None);
        assert_eq!(state.render_mode(), RenderMode::Chrome);
        assert_eq!(state.panic_key, "`");
        assert_eq!(state.panic_target, "https://google.com");
        assert!(!state.is_capturing_key);
    }

    #[test]
    fn test_target_toggles_render_mode() {
        let mut store = SessionStore::new();

        store.set_current_target(Some("https://example.com".into()));
        assert_eq!(store.state().render_mode(), RenderMode::Browsing);
        assert_eq!(store.state().address_draft, "https://example.com");

        store.set_address_draft("https://exam");
        store.set_current_target(None);
        assert_eq!(store.state().render_mode(), RenderMode::Chrome);
        assert_eq!(store.state().address_draft, "");
    }

    #[test]
    fn test_empty_target_is_home() {
        let mut store = SessionStore::new();
        store.set_current_target(Some(String::new()));
        assert_eq!(store.state().render_mode(), RenderMode::Chrome);
    }

    #[test]
    fn test_observers_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut store = SessionStore::new();

        let first = Arc::clone(&log);
        store.subscribe(move |change: &StateChange, _: &SessionState| {
            first.lock().push(("first", *change));
        });
        let second = Arc::clone(&log);
        store.subscribe(move |change: &StateChange, _: &SessionState| {
            second.lock().push(("second", *change));
        });

        store.set_panic_target("https://classroom.google.com");

        assert_eq!(
            *log.lock(),
            vec![
                ("first", StateChange::PanicTarget),
                ("second", StateChange::PanicTarget),
            ]
        );
    }

    #[test]
    fn test_observer_sees_updated_state() {
        let seen = Arc::new(Mutex::new(None));
        let mut store = SessionStore::new();
        let sink = Arc::clone(&seen);
        store.subscribe(move |_: &StateChange, state: &SessionState| {
            *sink.lock() = Some(state.cloak_identity);
        });

        store.set_cloak_identity("drive");
        assert_eq!(*seen.lock(), Some(CloakIdentity::Drive));
    }

    #[test]
    fn test_unsubscribe_stops_dispatch() {
        let count = Arc::new(Mutex::new(0));
        let mut store = SessionStore::new();
        let counter = Arc::clone(&count);
        let id = store.subscribe(move |_: &StateChange, _: &SessionState| {
            *counter.lock() += 1;
        });

        store.set_panic_key("p");
        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.set_panic_key("q");

        assert_eq!(*count.lock(), 1);
        assert_eq!(store.observer_count(), 0);
    }

    #[test]
    fn test_unknown_cloak_resolves_to_none() {
        let mut store = SessionStore::new();
        store.set_cloak_identity("google");
        let resolved = store.set_cloak_identity("not-a-cloak");
        assert_eq!(resolved, CloakIdentity::None);
        assert_eq!(store.state().cloak_identity, CloakIdentity::None);
    }
}
