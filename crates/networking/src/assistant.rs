//! Assistant panel backend.
//!
//! Stateless: each prompt becomes one `generateContent` call and the reply is
//! reduced to a single text message. Failures never propagate to the caller
//! as errors; they become the fixed apology message.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::AssistantConfig;
use crate::error::{NetworkError, NetworkResult};

/// Shown when the model could not be reached
pub const ERROR_REPLY: &str = "Sorry, I encountered an error.";

/// Shown when the model answered with no text
pub const EMPTY_REPLY: &str = "No response";

/// Upper bound for one generation round-trip
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// One chat message as the panel shows it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantReply {
    pub role: String,
    pub text: String,
}

impl AssistantReply {
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: "model".to_string(),
            text: text.into(),
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

/// Client for the text-generation API
pub struct AssistantClient {
    config: AssistantConfig,
    http: reqwest::Client,
}

impl AssistantClient {
    pub fn new(config: AssistantConfig) -> NetworkResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("Echo/0.1")
            .build()?;
        Ok(Self { config, http })
    }

    /// Whether an API key is configured
    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }

    /// Send `prompt` and return the model's text, possibly empty
    pub async fn generate(&self, prompt: &str) -> NetworkResult<String> {
        let api_key = self.config.api_key.as_deref().ok_or_else(|| {
            NetworkError::UpstreamError("assistant API key is not configured".to_string())
        })?;

        let body = GenerateRequest {
            contents: [Content {
                role: "user",
                parts: [Part { text: prompt }],
            }],
        };

        let response = self
            .http
            .post(self.generate_url())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NetworkError::UpstreamError(format!(
                "assistant API returned {}",
                response.status()
            )));
        }

        let parsed: GenerateResponse = response.json().await?;
        Ok(parsed.text())
    }

    /// Answer `prompt` the way the panel displays it.
    ///
    /// Returns `Err` carrying the apology reply when the call failed, so the
    /// caller can pick a status code while still showing a message.
    pub async fn reply(&self, prompt: &str) -> Result<AssistantReply, AssistantReply> {
        match self.generate(prompt).await {
            Ok(text) if text.trim().is_empty() => Ok(AssistantReply::model(EMPTY_REPLY)),
            Ok(text) => Ok(AssistantReply::model(text)),
            Err(e) => {
                log::error!("Assistant request failed: {}", e);
                Err(AssistantReply::model(ERROR_REPLY))
            }
        }
    }
}
