//! JSON API over the shared browsing session.
//!
//! The store sits behind a `parking_lot::Mutex` and the shortcut registry
//! behind a `parking_lot::RwLock`; no lock is held across an await.
//!
//! The server has no sandbox surface or host document, so it drives the
//! store directly (`process_key`, `normalize`, `set_current_target`) rather
//! than through `echo_tabs::BrowsingSession`. Key capture and panic matching
//! share `process_key` with the facade; cloak effects and listener gating
//! stay on the client side.

use std::sync::Arc;

use bytes::BytesMut;
use hyper::body::HttpBody;
use hyper::{Body, Method, Request, Response, StatusCode};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use echo_tabs::panic::process_key;
use echo_tabs::{
    normalize, CloakIdentity, InputSource, KeyEvent, RenderMode, SearchEngine, SessionStore,
    ShortcutRegistry,
};

use crate::assistant::AssistantClient;
use crate::error::{NetworkError, NetworkResult};
use crate::response;

/// Shared session state handed to every connection task
#[derive(Clone)]
pub struct SessionHandle {
    pub store: Arc<Mutex<SessionStore>>,
    pub shortcuts: Arc<RwLock<ShortcutRegistry>>,
    pub engine: SearchEngine,
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self {
            store: Arc::new(Mutex::new(SessionStore::new())),
            shortcuts: Arc::new(RwLock::new(ShortcutRegistry::new())),
            engine: SearchEngine::google_embeddable(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CloakView {
    id: &'static str,
    title: &'static str,
    icon: &'static str,
}

impl From<CloakIdentity> for CloakView {
    fn from(identity: CloakIdentity) -> Self {
        let profile = identity.profile();
        Self {
            id: identity.id(),
            title: profile.title,
            icon: profile.icon,
        }
    }
}

#[derive(Debug, Serialize)]
struct SessionView {
    current_target: Option<String>,
    address_draft: String,
    render_mode: RenderMode,
    cloak: CloakView,
    panic_key: String,
    panic_target: String,
    is_capturing_key: bool,
}

#[derive(Debug, Deserialize)]
struct CloakBody {
    identity: String,
}

#[derive(Debug, Deserialize)]
struct PanicBody {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    target: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TargetBody {
    input: String,
    #[serde(default = "default_source")]
    via: InputSource,
}

fn default_source() -> InputSource {
    InputSource::Search
}

#[derive(Debug, Deserialize)]
struct ShortcutBody {
    name: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct PromptBody {
    prompt: String,
}

/// Handler for everything under `/api/`
pub struct Api {
    session: SessionHandle,
    assistant: Arc<AssistantClient>,
    max_body_bytes: usize,
}

impl Api {
    pub fn new(session: SessionHandle, assistant: Arc<AssistantClient>, max_body_bytes: usize) -> Self {
        Self {
            session,
            assistant,
            max_body_bytes,
        }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Serve one API request; never fails, errors become JSON responses
    pub async fn handle(&self, req: Request<Body>) -> Response<Body> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        match self.route(req).await {
            Ok(response) => response,
            Err(NetworkError::PayloadTooLarge { limit }) => response::json_error(
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("Request body exceeds {} bytes", limit),
            ),
            Err(NetworkError::SerializationError(e)) => {
                response::json_error(StatusCode::BAD_REQUEST, format!("Invalid JSON: {}", e))
            }
            Err(e) => {
                log::error!("{} {} failed: {}", method, path, e);
                response::json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        }
    }

    async fn route(&self, req: Request<Body>) -> NetworkResult<Response<Body>> {
        let method = req.method().clone();
        let path = req.uri().path().trim_end_matches('/').to_string();

        match (&method, path.as_str()) {
            (&Method::GET, "/api/session") => Ok(self.session_view()),
            (&Method::PUT, "/api/session/cloak") => {
                let body: CloakBody = self.read_json(req).await?;
                self.session.store.lock().set_cloak_identity(&body.identity);
                Ok(self.session_view())
            }
            (&Method::PUT, "/api/session/panic") => {
                let body: PanicBody = self.read_json(req).await?;
                let mut store = self.session.store.lock();
                if let Some(key) = body.key {
                    store.set_panic_key(key);
                }
                if let Some(target) = body.target {
                    store.set_panic_target(target);
                }
                drop(store);
                Ok(self.session_view())
            }
            (&Method::POST, "/api/session/capture") => {
                self.session.store.lock().set_capturing_key(true);
                Ok(self.session_view())
            }
            (&Method::POST, "/api/session/key") => {
                let event: KeyEvent = self.read_json(req).await?;
                let outcome = process_key(&mut self.session.store.lock(), &event);
                Ok(response::json(StatusCode::OK, &outcome))
            }
            (&Method::POST, "/api/session/target") => {
                let body: TargetBody = self.read_json(req).await?;
                match normalize(&body.input, body.via, &self.session.engine) {
                    Some(url) => {
                        self.session.store.lock().set_current_target(Some(url));
                        Ok(self.session_view())
                    }
                    None => Ok(response::json_error(
                        StatusCode::BAD_REQUEST,
                        "input must not be empty",
                    )),
                }
            }
            (&Method::DELETE, "/api/session/target") => {
                self.session.store.lock().set_current_target(None);
                Ok(self.session_view())
            }
            (&Method::GET, "/api/shortcuts") => {
                let shortcuts = self.session.shortcuts.read();
                let entries: Vec<_> = shortcuts.entries().collect();
                Ok(response::json(StatusCode::OK, &entries))
            }
            (&Method::POST, "/api/shortcuts") => {
                let body: ShortcutBody = self.read_json(req).await?;
                let mut shortcuts = self.session.shortcuts.write();
                match shortcuts.add(&body.name, &body.url) {
                    Ok(entry) => Ok(response::json(StatusCode::CREATED, entry)),
                    Err(e) => Ok(response::json_error(StatusCode::BAD_REQUEST, e.to_string())),
                }
            }
            (&Method::GET, "/api/cloaks") => {
                let cloaks: Vec<CloakView> =
                    CloakIdentity::ALL.iter().copied().map(CloakView::from).collect();
                Ok(response::json(StatusCode::OK, &cloaks))
            }
            (&Method::POST, "/api/assistant") => {
                let body: PromptBody = self.read_json(req).await?;
                let prompt = body.prompt.trim();
                if prompt.is_empty() {
                    return Ok(response::json_error(
                        StatusCode::BAD_REQUEST,
                        "prompt must not be empty",
                    ));
                }
                Ok(match self.assistant.reply(prompt).await {
                    Ok(reply) => response::json(StatusCode::OK, &reply),
                    Err(apology) => response::json(StatusCode::BAD_GATEWAY, &apology),
                })
            }
            _ => Ok(response::json_error(
                StatusCode::NOT_FOUND,
                format!("No API route for {} {}", method, path),
            )),
        }
    }

    fn session_view(&self) -> Response<Body> {
        let store = self.session.store.lock();
        let state = store.state();
        let view = SessionView {
            current_target: state.current_target.clone(),
            address_draft: state.address_draft.clone(),
            render_mode: state.render_mode(),
            cloak: state.cloak_identity.into(),
            panic_key: state.panic_key.clone(),
            panic_target: state.panic_target.clone(),
            is_capturing_key: state.is_capturing_key,
        };
        response::json(StatusCode::OK, &view)
    }

    /// Read at most `max_body_bytes` and decode them as JSON
    async fn read_json<T: DeserializeOwned>(&self, req: Request<Body>) -> NetworkResult<T> {
        let limit = self.max_body_bytes;
        if let Some(length) = req.body().size_hint().exact() {
            if length as usize > limit {
                return Err(NetworkError::PayloadTooLarge { limit });
            }
        }

        let mut body = req.into_body();
        let mut buf = BytesMut::new();
        while let Some(chunk) = body.data().await {
            let chunk = chunk?;
            if buf.len() + chunk.len() > limit {
                return Err(NetworkError::PayloadTooLarge { limit });
            }
            buf.extend_from_slice(&chunk);
        }

        Ok(serde_json::from_slice(&buf)?)
    }
}
