use async_trait::async_trait;
use log::warn;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum NarrativeError {
    #[error("Narrative service is not configured")]
    NotConfigured,
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// External narrative collaborator. May be unreachable or misbehave at any
/// time; callers must resolve every error into the template fallback.
#[async_trait]
pub trait NarrativeApi: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, NarrativeError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: String,
}

/// Chat-completions client against an Azure OpenAI deployment.
pub struct AzureOpenAiClient {
    client: reqwest::Client,
    endpoint: String,
    deployment: String,
    api_key: String,
}

const API_VERSION: &str = "2024-02-15-preview";

fn request_url(endpoint: &str, deployment: &str) -> String {
    format!(
        "{}/openai/deployments/{}/chat/completions?api-version={}",
        endpoint.trim_end_matches('/'),
        deployment,
        API_VERSION
    )
}

impl AzureOpenAiClient {
    /// Build the client from environment configuration. Returns `None` when
    /// credentials are absent so the report stage can degrade to templates.
    pub fn from_env(timeout: Duration) -> Option<Self> {
        let api_key = env::var("AZURE_OPENAI_API_KEY").ok()?;
        let endpoint = env::var("AZURE_OPENAI_ENDPOINT").ok()?;
        let deployment = env::var("AZURE_OPENAI_GPT4O_DEPLOYMENT_NAME")
            .unwrap_or_else(|_| "gpt-4o".to_string());

        let client = match reqwest::Client::builder().timeout(timeout).build() {
            Ok(client) => client,
            Err(e) => {
                warn!("Failed to build narrative HTTP client: {}", e);
                return None;
            }
        };

        Some(Self {
            client,
            endpoint,
            deployment,
            api_key,
        })
    }
}

#[async_trait]
impl NarrativeApi for AzureOpenAiClient {
    async fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, NarrativeError> {
        let request = ChatRequest {
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens,
            temperature,
        };

        let response = self
            .client
            .post(request_url(&self.endpoint, &self.deployment))
            .header("api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "".to_string());
            return Err(NarrativeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| NarrativeError::MalformedResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or_else(|| NarrativeError::MalformedResponse("no completion in response".into()))
    }
}

impl std::fmt::Debug for AzureOpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureOpenAiClient")
            .field("endpoint", &self.endpoint)
            .field("deployment", &self.deployment)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}
