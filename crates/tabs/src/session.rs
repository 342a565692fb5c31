//! The browsing session: store, navigation, shortcuts and safety controls
//! wired together behind the operations the UI exposes.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::cloak::{apply_cloak, CloakEffect, CloakIdentity};
use crate::document::Document;
use crate::navigation::NavigationController;
use crate::normalize::{normalize_address, normalize_search, SearchEngine};
use crate::panic::{process_key, KeyEvent, KeyOutcome};
use crate::sandbox::Surface;
use crate::shortcuts::{Shortcut, ShortcutRegistry};
use crate::state::{ObserverId, RenderMode, SessionState, SessionStore};
use crate::{ShellError, ShellResult};

/// One user's browsing session
pub struct BrowsingSession<S: Surface, D: Document + 'static> {
    store: SessionStore,
    navigation: NavigationController<S>,
    shortcuts: ShortcutRegistry,
    document: Arc<Mutex<D>>,
    engine: SearchEngine,
    cloak_observer: Option<ObserverId>,
    key_listener_active: bool,
}

impl<S: Surface, D: Document + 'static> BrowsingSession<S, D> {
    /// Create and start a session
    pub fn new(surface: S, document: D, engine: SearchEngine) -> Self {
        let mut session = Self {
            store: SessionStore::new(),
            navigation: NavigationController::new(surface),
            shortcuts: ShortcutRegistry::new(),
            document: Arc::new(Mutex::new(document)),
            engine,
            cloak_observer: None,
            key_listener_active: false,
        };
        session.start();
        session
    }

    /// Register the cloak effect and the key listener.
    ///
    /// Safe to call repeatedly; at most one of each is ever active.
    pub fn start(&mut self) {
        if self.cloak_observer.is_none() {
            let effect = CloakEffect::new(Arc::clone(&self.document));
            self.cloak_observer = Some(self.store.subscribe(effect));
            apply_cloak(&mut *self.document.lock(), self.store.state().cloak_identity);
        }
        if !self.key_listener_active {
            log::debug!("Installing global key listener");
            self.key_listener_active = true;
        }
    }

    /// Tear down the cloak effect and the key listener
    pub fn end(&mut self) {
        if let Some(id) = self.cloak_observer.take() {
            self.store.unsubscribe(id);
        }
        if self.key_listener_active {
            log::debug!("Removing global key listener");
            self.key_listener_active = false;
        }
    }

    pub fn is_listening(&self) -> bool {
        self.key_listener_active
    }

    pub fn state(&self) -> &SessionState {
        self.store.state()
    }

    pub fn store_mut(&mut self) -> &mut SessionStore {
        &mut self.store
    }

    pub fn render_mode(&self) -> RenderMode {
        self.store.state().render_mode()
    }

    pub fn navigation(&self) -> &NavigationController<S> {
        &self.navigation
    }

    pub fn shortcuts(&self) -> &ShortcutRegistry {
        &self.shortcuts
    }

    /// Shared handle to the top-level document
    pub fn document(&self) -> Arc<Mutex<D>> {
        Arc::clone(&self.document)
    }

    /// Set the target and point the surface at it
    pub fn open(&mut self, url: &str) {
        self.store.set_current_target(Some(url.to_string()));
        self.navigation.load(url);
    }

    /// Submit the home search box. Returns the URL opened, if any.
    pub fn submit_search(&mut self, input: &str) -> Option<String> {
        let url = normalize_search(input, &self.engine)?;
        self.open(&url);
        Some(url)
    }

    /// Replace the address-bar text
    pub fn edit_address(&mut self, draft: &str) {
        self.store.set_address_draft(draft);
    }

    /// Submit the address bar. Returns the URL opened, if any.
    pub fn submit_address(&mut self) -> Option<String> {
        let url = normalize_address(&self.store.state().address_draft)?;
        self.open(&url);
        Some(url)
    }

    /// Leave browsing mode
    pub fn go_home(&mut self) {
        self.store.set_current_target(None);
        self.navigation.unload();
    }

    /// Open the shortcut at `index` in registry order
    pub fn open_shortcut(&mut self, index: usize) -> ShellResult<()> {
        let url = self
            .shortcuts
            .get(index)
            .map(|s| s.url.clone())
            .ok_or(ShellError::UnknownShortcut(index))?;
        self.open(&url);
        Ok(())
    }

    pub fn add_shortcut(&mut self, name: &str, url: &str) -> ShellResult<Shortcut> {
        self.shortcuts.add(name, url).cloned()
    }

    /// Select a cloak by id; unknown ids fall back to the default identity
    pub fn set_cloak(&mut self, id: &str) -> CloakIdentity {
        self.store.set_cloak_identity(id)
    }

    pub fn set_panic_target(&mut self, target: &str) {
        self.store.set_panic_target(target);
    }

    /// Arm capture: the next key becomes the panic key
    pub fn begin_key_capture(&mut self) {
        self.store.set_capturing_key(true);
    }

    /// Feed a window-level keydown to the listener
    pub fn handle_key(&mut self, event: &KeyEvent) -> KeyOutcome {
        if !self.key_listener_active {
            return KeyOutcome::Passed;
        }
        let outcome = process_key(&mut self.store, event);
        if let KeyOutcome::Panic { target } = &outcome {
            self.document.lock().redirect(target);
        }
        outcome
    }

    pub fn reload(&mut self) {
        if self.is_browsing() {
            self.navigation.reload();
        }
    }

    pub fn back(&mut self) {
        if self.is_browsing() {
            self.navigation.back();
        }
    }

    pub fn forward(&mut self) {
        if self.is_browsing() {
            self.navigation.forward();
        }
    }

    /// Open the current target outside the sandbox
    pub fn open_externally(&mut self) {
        if let Some(target) = self.store.state().current_target.clone() {
            self.navigation
                .open_externally(&target, &mut *self.document.lock());
        }
    }

    /// Inject the inspector into the surface
    pub fn inject_diagnostics(&mut self) -> ShellResult<()> {
        if !self.is_browsing() {
            return Err(ShellError::NotBrowsing);
        }
        self.navigation
            .inject_diagnostics(&mut *self.document.lock())
    }

    fn is_browsing(&self) -> bool {
        let browsing = self.render_mode() == RenderMode::Browsing;
        if !browsing {
            log::debug!("Navigation action ignored outside browsing mode");
        }
        browsing
    }
}

impl<S: Surface, D: Document + 'static> Drop for BrowsingSession<S, D> {
    fn drop(&mut self) {
        self.end();
    }
}
