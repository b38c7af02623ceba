use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{GeminiClient, GeminiError};

#[derive(Debug, Serialize, Deserialize)]
struct GenerateContentBody {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub model_version: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, its parts joined together.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();

        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

impl GeminiClient {
    #[instrument(skip_all, fields(model = %self.config.model), err)]
    pub async fn generate_content(&self, prompt: impl Into<String>) -> Result<String, GeminiError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );

        let body = GenerateContentBody {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.into()),
                }],
            }],
        };

        let res = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body, "Gemini request failed");

            return Err(GeminiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = res.bytes().await?;
        let body: GenerateContentResponse = serde_json::from_slice(&bytes)
            .map_err(|e| GeminiError::Malformed(e.to_string()))?;

        body.text().ok_or(GeminiError::Empty)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::GeminiConfig;

    fn client(server: &MockServer) -> GeminiClient {
        GeminiClient::new(
            GeminiConfig {
                api_key: "test-key".to_string(),
                model: "gemini-1.5-flash".to_string(),
                base_url: server.uri(),
            },
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn returns_text_of_first_candidate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": {
                        "role": "model",
                        "parts": [{ "text": "Title: Pasta\n" }, { "text": "1. Boil water." }]
                    },
                    "finishReason": "STOP"
                }]
            })))
            .mount(&server)
            .await;

        let text = client(&server).generate_content("make pasta").await.unwrap();

        assert_eq!(text, "Title: Pasta\n1. Boil water.");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
            .mount(&server)
            .await;

        let err = client(&server).generate_content("make pasta").await.unwrap_err();

        match err {
            GeminiError::Status { status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body, "API key not valid");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_candidates_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "promptFeedback": { "blockReason": "SAFETY" }
            })))
            .mount(&server)
            .await;

        let err = client(&server).generate_content("make pasta").await.unwrap_err();

        assert!(matches!(err, GeminiError::Empty));
    }

    #[tokio::test]
    async fn garbage_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client(&server).generate_content("make pasta").await.unwrap_err();

        assert!(matches!(err, GeminiError::Malformed(_)));
    }
}
