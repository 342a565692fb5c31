//! Echo serving layer.
//!
//! A single listener carries two kinds of traffic. Requests and upgrades in
//! the tunnel namespace go to a [`Tunnel`]; everything else is served by the
//! [`Application`]: the session JSON API, the content-rewriting bundle, and
//! the static front end.

pub mod api;
pub mod app;
pub mod assistant;
pub mod config;
pub mod error;
pub mod request;
pub mod response;
pub mod router;
pub mod server;
pub mod static_files;
pub mod tunnel;

/// Re-export common types for easier usage
pub use api::{Api, SessionHandle};
pub use app::Application;
pub use assistant::{AssistantClient, AssistantReply};
pub use config::{AssistantConfig, ServeMode, ServerConfig};
pub use error::{NetworkError, NetworkResult};
pub use request::InboundConnection;
pub use router::{Handler, Route, Router, RouterSnapshot};
pub use server::{start, start_with_session, ServerHandle};
pub use static_files::StaticDir;
pub use tunnel::{BareRelay, Tunnel};
