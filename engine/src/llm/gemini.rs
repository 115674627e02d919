use super::{GenerationRequest, LLMError, LLMProvider};
use crate::config::LLMConfig;
use crate::secrets::SecretString;
use async_trait::async_trait;
use reqwest::StatusCode;
use sdk::types::{ModelInfo, Role};
use serde_json::json;

/// Header carrying the API key, keeps the key out of request URLs
pub(crate) const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GeminiProvider {
    base_url: String,
    model: String,
    api_key: SecretString,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(config: &LLMConfig, model: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

/// Map a non-success HTTP status from the Gemini API to an [`LLMError`]
pub(crate) fn error_for_status(status: StatusCode, body: String) -> LLMError {
    match status.as_u16() {
        400 | 404 => LLMError::InvalidRequest(body),
        429 => LLMError::RateLimitExceeded,
        401 | 403 => LLMError::AuthenticationFailed(body),
        _ => LLMError::ProviderUnavailable(format!("Gemini API error ({}): {}", status, body)),
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerationRequest<'_>) -> super::Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let contents: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|msg| {
                json!({
                    "role": if msg.role == Role::Agent { "model" } else { "user" },
                    "parts": [{"text": msg.content}]
                })
            })
            .collect();

        let payload = json!({
            "systemInstruction": {"parts": [{"text": request.system_instruction}]},
            "contents": contents,
            "generationConfig": {
                "temperature": request.sampling.temperature,
                "topP": request.sampling.top_p,
            }
        });

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, self.api_key.expose())
            .json(&payload)
            .send()
            .await
            .map_err(|e| LLMError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, text));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.to_string()))?;

        let candidate = data
            .get("candidates")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .ok_or_else(|| {
                let reason = data
                    .pointer("/promptFeedback/blockReason")
                    .and_then(|r| r.as_str())
                    .unwrap_or("none given");
                LLMError::ParseError(format!("No candidates in response (block reason: {})", reason))
            })?;

        // A candidate stopped early (e.g. by safety filters) may carry no parts
        let mut full_text = String::new();
        if let Some(parts) = candidate.pointer("/content/parts").and_then(|p| p.as_array()) {
            for part in parts {
                if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                    full_text.push_str(text);
                }
            }
        }

        Ok(full_text)
    }

    async fn list_models(&self) -> super::Result<Vec<ModelInfo>> {
        let url = format!("{}/models", self.base_url);
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("pageSize", "1000".to_string())];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let response = self
                .client
                .get(&url)
                .header(API_KEY_HEADER, self.api_key.expose())
                .query(&query)
                .send()
                .await
                .map_err(|e| LLMError::NetworkError(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                return Err(error_for_status(status, text));
            }

            let data: serde_json::Value = response
                .json()
                .await
                .map_err(|e| LLMError::ParseError(e.to_string()))?;

            for model in data
                .get("models")
                .and_then(|m| m.as_array())
                .into_iter()
                .flatten()
            {
                let generates = model
                    .get("supportedGenerationMethods")
                    .and_then(|m| m.as_array())
                    .is_some_and(|methods| {
                        methods.iter().any(|m| m.as_str() == Some("generateContent"))
                    });
                if !generates {
                    continue;
                }

                let name = model.get("name").and_then(|n| n.as_str()).unwrap_or("");
                let text_field = |key: &str| {
                    model
                        .get(key)
                        .and_then(|v| v.as_str())
                        .filter(|s| !s.is_empty())
                        .unwrap_or("-")
                        .to_string()
                };

                models.push(ModelInfo {
                    id: name.trim_start_matches("models/").to_string(),
                    display_name: text_field("displayName"),
                    description: text_field("description"),
                });
            }

            page_token = data
                .get("nextPageToken")
                .and_then(|t| t.as_str())
                .filter(|t| !t.is_empty())
                .map(str::to_string);

            if page_token.is_none() {
                break;
            }
        }

        models.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(models)
    }
}
