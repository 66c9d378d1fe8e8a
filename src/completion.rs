//! Completion service client (Azure OpenAI)
//!
//! Forwards a single user-role message to a chat-completion deployment and
//! returns the first reply's text. Supports the Azure deployment wire shape
//! and the plain OpenAI one, selected by `api_type`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::config::CompletionConfig;
use crate::{Error, Result};

/// Completion call seam, stubbed in tests
#[async_trait]
pub trait CompletionApi: Send + Sync {
    /// Send one user message, return the first reply's text
    async fn complete(&self, message: &str) -> Result<String>;
}

/// Chat-completion client
pub struct CompletionClient {
    http_client: Client,
    config: CompletionConfig,
}

/// Chat-completion response, reduced to the fields we read
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

impl CompletionClient {
    /// Create a new completion client
    #[must_use]
    pub fn new(http_client: Client, config: CompletionConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }

    /// Request URL for the configured wire shape
    fn request_url(&self) -> Result<Url> {
        let endpoint = self
            .config
            .endpoint
            .as_ref()
            .ok_or_else(|| Error::Config("completion endpoint not set".to_string()))?;
        let deployment = self
            .config
            .deployment
            .as_ref()
            .ok_or_else(|| Error::Config("completion deployment not set".to_string()))?;

        let endpoint = endpoint.trim_end_matches('/');
        let raw = if self.config.api_type == "azure" {
            format!("{endpoint}/openai/deployments/{deployment}/chat/completions")
        } else {
            format!("{endpoint}/v1/chat/completions")
        };

        let mut url =
            Url::parse(&raw).map_err(|e| Error::Config(format!("Invalid endpoint URL: {e}")))?;
        if self.config.api_type == "azure" {
            url.query_pairs_mut()
                .append_pair("api-version", &self.config.api_version);
        }
        Ok(url)
    }

    /// Request body for the configured wire shape
    fn request_body(&self, message: &str) -> serde_json::Value {
        let mut body = json!({
            "messages": [{"role": "user", "content": message}]
        });
        if self.config.api_type != "azure" {
            // The plain OpenAI shape names the model in the body
            body["model"] = json!(self.config.deployment);
        }
        body
    }
}

#[async_trait]
impl CompletionApi for CompletionClient {
    async fn complete(&self, message: &str) -> Result<String> {
        let url = self.request_url()?;
        let body = self.request_body(message);

        let mut request = self.http_client.post(url).json(&body);
        if let Some(api_key) = &self.config.api_key {
            request = if self.config.api_type == "azure" {
                request.header("api-key", api_key)
            } else {
                request.bearer_auth(api_key)
            };
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Completion(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Completion(format!("HTTP {status} - {body}")));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Completion(format!("unparseable response: {e}")))?;

        debug!(choices = completion.choices.len(), "Completion received");
        first_answer(completion)
    }
}

/// Extract the first reply's text
fn first_answer(response: ChatCompletionResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| Error::Completion("response carried no choices".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn azure_config() -> CompletionConfig {
        CompletionConfig {
            endpoint: Some("https://example.openai.azure.com".to_string()),
            deployment: Some("gpt-4o".to_string()),
            api_key: Some("key".to_string()),
            api_version: "2024-02-01".to_string(),
            api_type: "azure".to_string(),
        }
    }

    #[test]
    fn azure_url_targets_deployment_with_api_version() {
        let client = CompletionClient::new(Client::new(), azure_config());
        let url = client.request_url().unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-02-01"
        );
    }

    #[test]
    fn azure_url_tolerates_trailing_slash() {
        let mut config = azure_config();
        config.endpoint = Some("https://example.openai.azure.com/".to_string());
        let client = CompletionClient::new(Client::new(), config);
        let url = client.request_url().unwrap();
        assert!(!url.path().contains("//"));
    }

    #[test]
    fn openai_url_skips_deployment_path() {
        let mut config = azure_config();
        config.api_type = "openai".to_string();
        config.endpoint = Some("https://api.openai.com".to_string());
        let client = CompletionClient::new(Client::new(), config);
        let url = client.request_url().unwrap();
        assert_eq!(url.as_str(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn missing_endpoint_is_config_error() {
        let mut config = azure_config();
        config.endpoint = None;
        let client = CompletionClient::new(Client::new(), config);
        assert!(matches!(
            client.request_url().unwrap_err(),
            Error::Config(_)
        ));
    }

    #[test]
    fn body_is_single_user_message() {
        let client = CompletionClient::new(Client::new(), azure_config());
        let body = client.request_body("hello there");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hello there");
        assert!(body.get("model").is_none());
    }

    #[test]
    fn openai_body_names_the_model() {
        let mut config = azure_config();
        config.api_type = "openai".to_string();
        let client = CompletionClient::new(Client::new(), config);
        let body = client.request_body("hi");
        assert_eq!(body["model"], "gpt-4o");
    }

    #[test]
    fn first_answer_returns_first_choice_text() {
        let response: ChatCompletionResponse = serde_json::from_value(serde_json::json!({
            "choices": [
                {"message": {"role": "assistant", "content": "first"}},
                {"message": {"role": "assistant", "content": "second"}}
            ]
        }))
        .unwrap();
        assert_eq!(first_answer(response).unwrap(), "first");
    }

    #[test]
    fn empty_choices_is_a_completion_error() {
        let response: ChatCompletionResponse =
            serde_json::from_value(serde_json::json!({"choices": []})).unwrap();
        assert!(matches!(
            first_answer(response).unwrap_err(),
            Error::Completion(_)
        ));
    }
}
