//! Navigation controller.
//!
//! Turns user intents into operations on the sandbox surface. Everything
//! except diagnostics injection is fire-and-forget: the shell cannot see into
//! a cross-origin frame, so it never waits on or reports what the frame did.

use crate::document::Document;
use crate::sandbox::{Surface, SurfaceError};
use crate::{ShellError, ShellResult};

/// Script appended to the framed document to bring up the in-page inspector
pub const DIAGNOSTICS_BOOTSTRAP: &str = r#"(function () {
  var script = document.createElement('script');
  script.src = "//cdn.jsdelivr.net/npm/eruda";
  document.body.appendChild(script);
  script.onload = function () { eruda.init() }
})();"#;

/// Notice shown when the inspector cannot be injected
pub const CROSS_ORIGIN_NOTICE: &str =
    "Cannot open the inspector on this site due to security restrictions (cross-origin).";

/// Drives a single sandbox surface
pub struct NavigationController<S: Surface> {
    surface: S,
}

impl<S: Surface> NavigationController<S> {
    pub fn new(surface: S) -> Self {
        Self { surface }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Point the surface at `url`
    pub fn load(&mut self, url: &str) {
        log::debug!("Loading {} in sandbox", url);
        self.surface.load(url);
    }

    /// Drop the surface's document when leaving browsing mode
    pub fn unload(&mut self) {
        self.surface.unload();
    }

    /// Re-request the surface's current URL verbatim
    pub fn reload(&mut self) {
        match self.surface.current_url() {
            Some(url) => self.load(&url),
            None => log::debug!("Reload ignored, surface has no URL"),
        }
    }

    /// Go back inside the surface; denial is logged and absorbed
    pub fn back(&mut self) {
        if let Err(e) = self.surface.history_back() {
            log::warn!("Back navigation failed: {}", e);
        }
    }

    /// Go forward inside the surface; denial is logged and absorbed
    pub fn forward(&mut self) {
        if let Err(e) = self.surface.history_forward() {
            log::warn!("Forward navigation failed: {}", e);
        }
    }

    /// Open `target` in a new top-level context, bypassing the sandbox
    pub fn open_externally(&self, target: &str, document: &mut dyn Document) {
        log::info!("Opening {} outside the sandbox", target);
        document.open_window(target);
    }

    /// Inject the inspector bootstrap into the framed document.
    ///
    /// Unlike the other actions this one reports failure, both as an error and
    /// as a visible notice on `document`.
    pub fn inject_diagnostics(&mut self, document: &mut dyn Document) -> ShellResult<()> {
        match self.surface.inject_script(DIAGNOSTICS_BOOTSTRAP) {
            Ok(()) => {
                log::info!("Inspector injected into sandbox");
                Ok(())
            }
            Err(SurfaceError::CrossOriginDenied { url }) => {
                log::error!("Cannot inject inspector into {} (cross-origin)", url);
                document.notify(CROSS_ORIGIN_NOTICE);
                Err(ShellError::CrossOriginDenied { url })
            }
            Err(e @ SurfaceError::ScriptsBlocked) => {
                log::error!("Cannot inject inspector: {}", e);
                document.notify(&format!("Cannot open the inspector: {}.", e));
                Err(ShellError::Surface(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::HeadlessDocument;
    use crate::sandbox::{SandboxPolicy, SimulatedSurface};
    use pretty_assertions::assert_eq;
    use url::Url;

    fn controller() -> NavigationController<SimulatedSurface> {
        let shell = Url::parse("http://localhost:3000/").unwrap();
        NavigationController::new(SimulatedSurface::new(&shell, SandboxPolicy::default()))
    }

    #[test]
    fn test_reload_is_idempotent() {
        let mut nav = controller();
        nav.load("https://example.com/");

        nav.reload();
        let after_one = (nav.surface().current_url(), nav.surface().history().len());
        nav.reload();
        let after_two = (nav.surface().current_url(), nav.surface().history().len());

        assert_eq!(after_one, after_two);
        assert_eq!(after_two.0.as_deref(), Some("https://example.com/"));
        assert_eq!(after_two.1, 1);
    }

    #[test]
    fn test_reload_without_url_is_noop() {
        let mut nav = controller();
        nav.reload();
        assert_eq!(nav.surface().load_count(), 0);
    }

    #[test_log::test]
    fn test_cross_origin_back_is_absorbed() {
        let mut nav = controller();
        nav.load("https://example.com/a");
        nav.load("https://example.com/b");

        nav.back();
        nav.forward();

        assert_eq!(nav.surface().location(), Some("https://example.com/b"));
    }

    #[test]
    fn test_inject_cross_origin_notifies() {
        let mut nav = controller();
        let mut doc = HeadlessDocument::new();
        nav.load("https://example.com/");

        let result = nav.inject_diagnostics(&mut doc);

        assert!(matches!(result, Err(ShellError::CrossOriginDenied { .. })));
        assert_eq!(doc.notices, vec![CROSS_ORIGIN_NOTICE.to_string()]);
    }

    #[test]
    fn test_inject_same_origin_succeeds() {
        let mut nav = controller();
        let mut doc = HeadlessDocument::new();
        nav.load("http://localhost:3000/service/page");

        nav.inject_diagnostics(&mut doc).unwrap();

        assert!(doc.notices.is_empty());
        assert_eq!(nav.surface().injected_scripts(), [DIAGNOSTICS_BOOTSTRAP.to_string()]);
    }

    #[test]
    fn test_open_externally_uses_document() {
        let nav = controller();
        let mut doc = HeadlessDocument::new();
        nav.open_externally("https://discord.com/app", &mut doc);
        assert_eq!(doc.opened_windows, vec!["https://discord.com/app".to_string()]);
    }
}
