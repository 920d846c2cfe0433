//! Chat-completions client for the language model backend.

use crate::config::get_config;
use crate::gateway::types::{
    ChatMessage, ChatRequest, ChatResponse, ContentPart, GatewayError, ImageUrlContent,
    MessageContent,
};
use crate::pipeline::types::Persona;
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use std::time::Duration;

/// Inputs for a context-conditioned page summarization call.
#[derive(Debug, Clone)]
pub struct SummarizeRequest {
    /// Name of the document the page belongs to.
    pub document_name: String,
    /// 1-based page number being summarized.
    pub page_number: u32,
    /// Raw text extracted from the page.
    pub page_text: String,
    /// Summary of the previous page within the same batch; empty for the
    /// first page of a batch.
    pub previous_summary: String,
    /// Persona injected as the system instruction.
    pub persona: Persona,
}

/// Uniform interface to the inference backend.
///
/// Every operation is a single bounded call with no automatic retry;
/// failures surface as errors and the caller decides how to degrade.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// General completion over an arbitrary instruction and context.
    async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> Result<String, GatewayError>;

    /// Produce a single coherent paragraph describing page imagery.
    async fn explain_image(
        &self,
        document_name: &str,
        image_bytes: &[u8],
    ) -> Result<String, GatewayError>;

    /// Produce a condensed rewrite of a page's text, conditioned on the
    /// previous page's summary for continuity only.
    async fn summarize_page(&self, request: &SummarizeRequest) -> Result<String, GatewayError>;

    /// Derive a structured persona from a document content sample.
    ///
    /// Backend failures surface as errors; malformed persona payloads fall
    /// back to [`Persona::default`] inside the implementation.
    async fn generate_persona(&self, sample_text: &str) -> Result<Persona, GatewayError>;
}

/// HTTP client for an Azure-style chat-completions deployment.
pub struct AzureChatGateway {
    http: Client,
    endpoint: String,
    api_key: String,
    api_version: String,
    model: String,
}

impl AzureChatGateway {
    /// Construct a gateway from explicit connection parameters.
    pub fn new(
        endpoint: &str,
        api_key: &str,
        api_version: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        if endpoint.trim().is_empty() {
            return Err(GatewayError::InvalidUrl("empty endpoint".to_string()));
        }
        let http = Client::builder()
            .user_agent("docwise/0.1")
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            api_version: api_version.to_string(),
            model: model.to_string(),
        })
    }

    /// Construct a gateway using configuration derived from the environment.
    pub fn from_config() -> Result<Self, GatewayError> {
        let config = get_config();
        Self::new(
            &config.azure_endpoint,
            &config.api_key,
            &config.api_version,
            &config.model,
            Duration::from_secs(config.llm_timeout_secs),
        )
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.model, self.api_version
        )
    }

    async fn send(&self, messages: Vec<ChatMessage>, temperature: f32) -> Result<String, GatewayError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            temperature,
        };

        let response = self
            .http
            .post(self.completions_url())
            .header("api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = GatewayError::UnexpectedStatus { status, body };
            tracing::warn!(error = %error, "Model backend returned an error");
            return Err(error);
        }

        let payload: ChatResponse = response.json().await?;
        let content = payload
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(GatewayError::EmptyResponse)?;

        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl LanguageModel for AzureChatGateway {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> Result<String, GatewayError> {
        self.send(
            vec![ChatMessage::system(system), ChatMessage::user(user)],
            temperature,
        )
        .await
    }

    async fn explain_image(
        &self,
        document_name: &str,
        image_bytes: &[u8],
    ) -> Result<String, GatewayError> {
        let mime = detect_image_mime(image_bytes);
        let data_url = format!("data:{mime};base64,{}", BASE64.encode(image_bytes));

        let messages = vec![
            ChatMessage::system(format!(
                "You are a helpful assistant that analyzes images for the document '{document_name}' \
                 and responds in Markdown."
            )),
            ChatMessage {
                role: "user",
                content: MessageContent::Parts(vec![
                    ContentPart::Text {
                        text: format!(
                            "Explain the content of this image from the document '{document_name}' \
                             in a single, coherent paragraph. The explanation should be concise \
                             and semantically meaningful."
                        ),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrlContent { url: data_url },
                    },
                ]),
            },
        ];

        self.send(messages, 0.7).await
    }

    async fn summarize_page(&self, request: &SummarizeRequest) -> Result<String, GatewayError> {
        let system = format!(
            "{} You summarize document pages using the previous page's summary as continuity \
             context only.",
            request.persona.as_instruction()
        );
        let user = format!(
            "Summarize the following page from the document '{name}' (Page {page}) with context \
             from the previous summary.\n\
             Use the previous summary only to keep continuity; the summary must not introduce \
             facts that are absent from the page text.\n\n\
             Previous summary: {previous}\n\n\
             Text:\n{text}\n",
            name = request.document_name,
            page = request.page_number,
            previous = request.previous_summary,
            text = request.page_text,
        );

        self.send(
            vec![ChatMessage::system(system), ChatMessage::user(user)],
            0.0,
        )
        .await
    }

    async fn generate_persona(&self, sample_text: &str) -> Result<Persona, GatewayError> {
        let system = "You derive instruction personas for document summarization assistants. \
                      Respond with a single JSON object containing exactly these string fields: \
                      domain, subject, expertise, qualification, style, tone, voice.";
        let user = format!(
            "Derive the persona best suited to summarize the document sampled below.\n\n\
             Sample:\n{sample_text}\n"
        );

        let content = self
            .send(
                vec![ChatMessage::system(system), ChatMessage::user(user)],
                0.0,
            )
            .await?;

        Ok(parse_persona(&content).unwrap_or_else(|| {
            tracing::warn!("Persona response was not valid JSON; using default persona");
            Persona::default()
        }))
    }
}

/// Detect an image MIME type from magic bytes, defaulting to PNG.
pub fn detect_image_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if bytes.len() > 11 && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/png"
    }
}

/// Parse a persona from model output, tolerating surrounding prose or
/// Markdown code fences.
fn parse_persona(content: &str) -> Option<Persona> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&content[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    fn gateway_for(server: &MockServer) -> AzureChatGateway {
        AzureChatGateway::new(
            &server.base_url(),
            "test-key",
            "2024-02-01",
            "gpt-4o",
            Duration::from_secs(5),
        )
        .expect("gateway")
    }

    #[tokio::test]
    async fn complete_returns_first_choice_content() {
        let server = MockServer::start_async().await;
        let gateway = gateway_for(&server);

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/openai/deployments/gpt-4o/chat/completions")
                    .query_param("api-version", "2024-02-01")
                    .header("api-key", "test-key");
                then.status(200).json_body(json!({
                    "choices": [{ "message": { "content": "  The answer.  " } }]
                }));
            })
            .await;

        let answer = gateway
            .complete("system", "question", 0.0)
            .await
            .expect("completion");

        mock.assert();
        assert_eq!(answer, "The answer.");
    }

    #[tokio::test]
    async fn non_success_status_surfaces_as_error() {
        let server = MockServer::start_async().await;
        let gateway = gateway_for(&server);

        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(429).body("rate limited");
            })
            .await;

        let error = gateway
            .complete("system", "question", 0.0)
            .await
            .expect_err("error response");

        assert!(
            matches!(error, GatewayError::UnexpectedStatus { status, .. } if status.as_u16() == 429)
        );
    }

    #[tokio::test]
    async fn empty_choices_surface_as_error() {
        let server = MockServer::start_async().await;
        let gateway = gateway_for(&server);

        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200).json_body(json!({ "choices": [] }));
            })
            .await;

        let error = gateway
            .complete("system", "question", 0.0)
            .await
            .expect_err("empty choices");
        assert!(matches!(error, GatewayError::EmptyResponse));
    }

    #[tokio::test]
    async fn explain_image_sends_multimodal_payload() {
        let server = MockServer::start_async().await;
        let gateway = gateway_for(&server);

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .body_contains("image_url")
                    .body_contains("data:image/jpeg;base64,");
                then.status(200).json_body(json!({
                    "choices": [{ "message": { "content": "A bar chart." } }]
                }));
            })
            .await;

        let explanation = gateway
            .explain_image("report.pdf", &[0xFF, 0xD8, 0xFF, 0xE0])
            .await
            .expect("explanation");

        mock.assert();
        assert_eq!(explanation, "A bar chart.");
    }

    #[tokio::test]
    async fn generate_persona_parses_structured_response() {
        let server = MockServer::start_async().await;
        let gateway = gateway_for(&server);

        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200).json_body(json!({
                    "choices": [{ "message": { "content": "```json\n{\"domain\":\"finance\",\"subject\":\"quarterly results\",\"expertise\":\"analyst\",\"qualification\":\"CFA\",\"style\":\"formal\",\"tone\":\"measured\",\"voice\":\"third person\"}\n```" } }]
                }));
            })
            .await;

        let persona = gateway.generate_persona("sample").await.expect("persona");
        assert_eq!(persona.domain, "finance");
        assert_eq!(persona.qualification, "CFA");
    }

    #[tokio::test]
    async fn generate_persona_defaults_on_malformed_json() {
        let server = MockServer::start_async().await;
        let gateway = gateway_for(&server);

        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200).json_body(json!({
                    "choices": [{ "message": { "content": "not json at all" } }]
                }));
            })
            .await;

        let persona = gateway.generate_persona("sample").await.expect("persona");
        assert_eq!(persona, Persona::default());
    }

    #[test]
    fn mime_detection_covers_common_formats() {
        assert_eq!(detect_image_mime(&[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
        assert_eq!(
            detect_image_mime(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A]),
            "image/png"
        );
        assert_eq!(detect_image_mime(b"garbage"), "image/png");
    }
}
