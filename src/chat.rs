//! Chat provider: session-based conversation with the language model

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::embedding::{qualified_model, GoogleErrorResponse};
use crate::error::{Error, Result};
use crate::message::Turn;

/// A stateful conversation. History accumulation is the session's job.
#[async_trait]
pub trait ChatSession: Send {
    /// Send one user prompt and return the model's reply text
    async fn send(&mut self, prompt: &str) -> Result<String>;

    /// Turns exchanged so far
    fn history(&self) -> &[Turn];
}

/// Opens chat sessions
pub trait ChatProvider: Send + Sync {
    fn start_session(&self, system_instructions: &str) -> Box<dyn ChatSession>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: WireContent<'a>,
    contents: Vec<WireContent<'a>>,
}

#[derive(Debug, Serialize)]
struct WireContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: [WirePart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct WirePart<'a> {
    text: &'a str,
}

impl<'a> WireContent<'a> {
    fn new(role: Option<&'static str>, text: &'a str) -> Self {
        Self {
            role,
            parts: [WirePart { text }],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Gemini `generateContent` over REST
#[derive(Clone)]
pub struct GeminiChat {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiChat {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config
            .gemini_api_key
            .clone()
            .ok_or_else(|| Error::config("GEMINI_API_KEY is not set"))?;

        Ok(Self {
            client: config.http_client()?,
            api_key,
            base_url: config.gemini_base_url.clone(),
            model: qualified_model(&config.chat_model),
        })
    }
}

impl ChatProvider for GeminiChat {
    fn start_session(&self, system_instructions: &str) -> Box<dyn ChatSession> {
        Box::new(GeminiSession {
            chat: self.clone(),
            system_instructions: system_instructions.to_string(),
            history: Vec::new(),
        })
    }
}

/// Keeps the turn history and replays it on every request
pub struct GeminiSession {
    chat: GeminiChat,
    system_instructions: String,
    history: Vec<Turn>,
}

#[async_trait]
impl ChatSession for GeminiSession {
    async fn send(&mut self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/v1beta/{}:generateContent",
            self.chat.base_url, self.chat.model
        );
        debug!(
            "Sending prompt ({} chars, {} prior turns) to {}",
            prompt.len(),
            self.history.len(),
            self.chat.model
        );

        let response = {
            let mut contents: Vec<WireContent<'_>> = self
                .history
                .iter()
                .map(|turn| WireContent::new(Some(turn.role.gemini_role()), &turn.text))
                .collect();
            contents.push(WireContent::new(Some("user"), prompt));

            let request = GenerateContentRequest {
                system_instruction: WireContent::new(None, &self.system_instructions),
                contents,
            };

            self.chat
                .client
                .post(&url)
                .header("x-goog-api-key", &self.chat.api_key)
                .json(&request)
                .send()
                .await?
        };

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<GoogleErrorResponse>(&body) {
                return Err(Error::provider(format!(
                    "Chat API error ({}): {}",
                    status, error.error.message
                )));
            }
            return Err(Error::provider(format!("Chat API error ({}): {}", status, body)));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| Error::provider(format!("Malformed chat response: {}", e)))?;

        let text = response_text(parsed)?;

        // Only a completed exchange becomes history
        self.history.push(Turn::user(prompt));
        self.history.push(Turn::assistant(text.clone()));
        Ok(text)
    }

    fn history(&self) -> &[Turn] {
        &self.history
    }
}

fn response_text(response: GenerateContentResponse) -> Result<String> {
    let candidate = match response.candidates.into_iter().next() {
        Some(candidate) => candidate,
        None => {
            let reason = response
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates returned".to_string());
            return Err(Error::provider(format!("Chat response was empty: {}", reason)));
        }
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(Error::provider("Chat response contained no text"));
    }
    Ok(text)
}
