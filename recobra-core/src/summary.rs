//! LLM lead summarization
//!
//! This is the expensive step the result cache exists for: a free-text recap
//! of the conversation plus a recommended `next_action` drawn from the
//! configured enumeration. The LLM is semi-trusted; its `next_action` output
//! goes through [`crate::validator::normalize`] before anything downstream
//! sees it.

use crate::config::{LlmConfig, LlmProvider};
use crate::error::{Error, Result};
use crate::types::{ClassificationResult, Transcript};
use crate::validator::{self, EnumConstraint, RepairAction};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::json;
use std::time::Duration;

const MAX_TRANSCRIPT_CHARS: usize = 16_000;
const SYSTEM_PROMPT: &str = "Eres un analista de recuperacion de ventas. Devuelve JSON estricto con dos campos: resumen (string corto en espanol) y siguiente_accion (uno de los valores permitidos que se indican).";

/// Summarization output with the repair audit for the enumerated field.
#[derive(Debug, Clone)]
pub struct LeadSummary {
    /// Short free-text recap of the conversation
    pub summary: String,
    /// Recommended next action, guaranteed to be in
    /// `allowed ∪ {default}` of the supplied constraint
    pub next_action: String,
    /// How `next_action` was obtained from the raw LLM value
    pub next_action_repair: RepairAction,
    /// Raw LLM response, kept for debugging
    pub raw_response: String,
}

/// LLM completion interface for summarization.
pub trait SummaryClient: Send + Sync {
    fn complete(&self, prompt: &str) -> Result<String>;
}

/// Create the default HTTP-backed summary client.
pub fn create_summary_client(llm: &LlmConfig) -> Result<Box<dyn SummaryClient>> {
    Ok(Box::new(HttpSummaryClient::new(llm)?))
}

/// Summarize a transcript with a supplied client.
///
/// The classification result is included in the prompt so the model sees the
/// derived flags; `constraint` governs the `siguiente_accion` enumeration.
pub fn summarize_with_client(
    transcript: &Transcript,
    classification: &ClassificationResult,
    constraint: &EnumConstraint,
    client: &dyn SummaryClient,
) -> Result<LeadSummary> {
    let prompt = build_prompt(transcript, classification, constraint);
    let raw_response = client.complete(&prompt)?;
    let parsed = parse_summary(&raw_response)?;

    let raw_action = parsed
        .get("siguiente_accion")
        .or_else(|| parsed.get("next_action"))
        .and_then(|v| v.as_str());
    let normalized = validator::normalize(raw_action, constraint);
    if normalized.was_repaired() {
        tracing::warn!(
            raw = ?raw_action,
            action = normalized.action.as_str(),
            "repaired siguiente_accion from LLM"
        );
    }

    let summary = parsed
        .get("resumen")
        .or_else(|| parsed.get("summary"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    Ok(LeadSummary {
        summary,
        next_action: normalized.value,
        next_action_repair: normalized.action,
        raw_response,
    })
}

fn build_prompt(
    transcript: &Transcript,
    classification: &ClassificationResult,
    constraint: &EnumConstraint,
) -> String {
    let mut lines = String::new();
    for message in transcript.iter() {
        let line = format!(
            "[{}] {}: {}\n",
            message.sent_at.to_rfc3339(),
            message.sender.as_str(),
            message.text().replace('\n', " ")
        );
        lines.push_str(&line);
        if lines.len() >= MAX_TRANSCRIPT_CHARS {
            lines.truncate(MAX_TRANSCRIPT_CHARS);
            lines.push_str("\n...[truncado]");
            break;
        }
    }

    format!(
        "{SYSTEM_PROMPT}\n\nValores permitidos para siguiente_accion: {}\n\nEstado detectado: handoff={}, transferencia_humana={}, plantilla={}, prevalidacion={}\n\nConversacion:\n{}\n\nDevuelve solo JSON.",
        constraint.allowed_values.join(", "),
        classification.handoff,
        classification.human_transfer,
        classification.template_sent,
        classification.pre_validation,
        lines
    )
}

fn parse_summary(raw: &str) -> Result<serde_json::Value> {
    let parsed = match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value) => value,
        Err(_) => {
            let extracted = extract_json_object(raw)?;
            serde_json::from_str::<serde_json::Value>(&extracted)?
        }
    };

    if !parsed.is_object() {
        return Err(Error::Llm(
            "summary response must be a JSON object".to_string(),
        ));
    }

    Ok(parsed)
}

fn extract_json_object(raw: &str) -> Result<String> {
    let start = raw
        .find('{')
        .ok_or_else(|| Error::Llm("summary response did not contain JSON object".to_string()))?;
    let end = raw
        .rfind('}')
        .ok_or_else(|| Error::Llm("summary response did not contain JSON object".to_string()))?;
    if end <= start {
        return Err(Error::Llm(
            "summary response JSON bounds are invalid".to_string(),
        ));
    }
    Ok(raw[start..=end].to_string())
}

struct HttpSummaryClient {
    model: String,
    provider: LlmProvider,
    endpoint: String,
    api_key: Option<String>,
    runtime: tokio::runtime::Runtime,
    http: reqwest::Client,
}

impl HttpSummaryClient {
    fn new(config: &LlmConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| config.provider.default_endpoint().to_string());
        let api_key = match config.provider {
            LlmProvider::Ollama => None,
            LlmProvider::Claude => config
                .api_key
                .clone()
                .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok()),
            LlmProvider::OpenAI => config
                .api_key
                .clone()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok()),
        };

        if matches!(config.provider, LlmProvider::Claude | LlmProvider::OpenAI) && api_key.is_none()
        {
            return Err(Error::Config(
                "llm.api_key (or provider env var) is required".to_string(),
            ));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Llm(format!("failed to build tokio runtime: {e}")))?;
        let timeout_secs = config.timeout_secs.max(1);
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Llm(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            model: config.model.clone(),
            provider: config.provider,
            endpoint,
            api_key,
            runtime,
            http,
        })
    }
}

impl SummaryClient for HttpSummaryClient {
    fn complete(&self, prompt: &str) -> Result<String> {
        self.runtime.block_on(async {
            match self.provider {
                LlmProvider::Ollama => {
                    let url = format!("{}/api/generate", self.endpoint.trim_end_matches('/'));
                    let resp = self
                        .http
                        .post(url)
                        .json(&json!({
                            "model": self.model,
                            "prompt": prompt,
                            "stream": false,
                        }))
                        .send()
                        .await
                        .map_err(|e| Error::Llm(format!("ollama request failed: {e}")))?;
                    let status = resp.status();
                    let body = resp
                        .text()
                        .await
                        .map_err(|e| Error::Llm(format!("ollama read body failed: {e}")))?;
                    if !status.is_success() {
                        return Err(Error::Llm(format!(
                            "ollama returned {}: {}",
                            status.as_u16(),
                            body
                        )));
                    }
                    let json: serde_json::Value = serde_json::from_str(&body)?;
                    json.get("response")
                        .and_then(|v| v.as_str())
                        .map(ToString::to_string)
                        .ok_or_else(|| {
                            Error::Llm(
                                "ollama response missing string field `response`".to_string(),
                            )
                        })
                }
                LlmProvider::Claude => {
                    let url = format!("{}/v1/messages", self.endpoint.trim_end_matches('/'));
                    let mut headers = HeaderMap::new();
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                    headers.insert(
                        "x-api-key",
                        HeaderValue::from_str(self.api_key.as_deref().unwrap_or_default())
                            .map_err(|e| {
                                Error::Llm(format!("invalid claude api key header: {e}"))
                            })?,
                    );
                    headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));

                    let resp = self
                        .http
                        .post(url)
                        .headers(headers)
                        .json(&json!({
                            "model": self.model,
                            "max_tokens": 400,
                            "temperature": 0,
                            "system": SYSTEM_PROMPT,
                            "messages": [{ "role": "user", "content": prompt }],
                        }))
                        .send()
                        .await
                        .map_err(|e| Error::Llm(format!("claude request failed: {e}")))?;
                    let status = resp.status();
                    let body = resp
                        .text()
                        .await
                        .map_err(|e| Error::Llm(format!("claude read body failed: {e}")))?;
                    if !status.is_success() {
                        return Err(Error::Llm(format!(
                            "claude returned {}: {}",
                            status.as_u16(),
                            body
                        )));
                    }
                    let json: serde_json::Value = serde_json::from_str(&body)?;
                    json.get("content")
                        .and_then(|v| v.as_array())
                        .and_then(|arr| arr.first())
                        .and_then(|v| v.get("text"))
                        .and_then(|v| v.as_str())
                        .map(ToString::to_string)
                        .ok_or_else(|| {
                            Error::Llm("claude response missing content[0].text".to_string())
                        })
                }
                LlmProvider::OpenAI => {
                    let url = format!(
                        "{}/v1/chat/completions",
                        self.endpoint.trim_end_matches('/')
                    );
                    let mut headers = HeaderMap::new();
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                    headers.insert(
                        AUTHORIZATION,
                        HeaderValue::from_str(&format!(
                            "Bearer {}",
                            self.api_key.as_deref().unwrap_or_default()
                        ))
                        .map_err(|e| Error::Llm(format!("invalid auth header: {e}")))?,
                    );

                    let resp = self
                        .http
                        .post(url)
                        .headers(headers)
                        .json(&json!({
                            "model": self.model,
                            "temperature": 0,
                            "messages": [
                                { "role": "system", "content": SYSTEM_PROMPT },
                                { "role": "user", "content": prompt }
                            ]
                        }))
                        .send()
                        .await
                        .map_err(|e| Error::Llm(format!("openai request failed: {e}")))?;
                    let status = resp.status();
                    let body = resp
                        .text()
                        .await
                        .map_err(|e| Error::Llm(format!("openai read body failed: {e}")))?;
                    if !status.is_success() {
                        return Err(Error::Llm(format!(
                            "openai returned {}: {}",
                            status.as_u16(),
                            body
                        )));
                    }
                    let json: serde_json::Value = serde_json::from_str(&body)?;
                    json.get("choices")
                        .and_then(|v| v.as_array())
                        .and_then(|arr| arr.first())
                        .and_then(|v| v.get("message"))
                        .and_then(|v| v.get("content"))
                        .and_then(|v| v.as_str())
                        .map(ToString::to_string)
                        .ok_or_else(|| {
                            Error::Llm(
                                "openai response missing choices[0].message.content".to_string(),
                            )
                        })
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatMessage, HandoffState, SenderRole};
    use chrono::Utc;

    struct MockClient {
        response: String,
    }

    impl SummaryClient for MockClient {
        fn complete(&self, _prompt: &str) -> Result<String> {
            Ok(self.response.clone())
        }
    }

    fn constraint() -> EnumConstraint {
        EnumConstraint::new(
            "next_action",
            vec![
                "llamar".to_string(),
                "esperar".to_string(),
                "enviar_plantilla".to_string(),
                "cerrar".to_string(),
            ],
            "N/A",
        )
    }

    fn transcript() -> Transcript {
        Transcript::new(vec![
            ChatMessage::new(
                SenderRole::Agent,
                "Estas a un paso de la aprobacion de tu prestamo personal",
                Utc::now(),
            ),
            ChatMessage::new(SenderRole::Customer, "si quisiera mas informacion", Utc::now()),
        ])
    }

    fn classification() -> ClassificationResult {
        ClassificationResult {
            handoff: HandoffState::Accepted,
            human_transfer: false,
            template_sent: false,
            pre_validation: false,
            evidence: vec![],
        }
    }

    #[test]
    fn test_summary_passes_valid_action_through() {
        let client = MockClient {
            response: r#"{"resumen":"cliente interesado","siguiente_accion":"llamar"}"#.to_string(),
        };
        let summary =
            summarize_with_client(&transcript(), &classification(), &constraint(), &client)
                .unwrap();
        assert_eq!(summary.summary, "cliente interesado");
        assert_eq!(summary.next_action, "llamar");
        assert_eq!(summary.next_action_repair, RepairAction::PassedThrough);
    }

    #[test]
    fn test_summary_strips_quoted_action() {
        let client = MockClient {
            response: r#"{"resumen":"ok","siguiente_accion":"'esperar'"}"#.to_string(),
        };
        let summary =
            summarize_with_client(&transcript(), &classification(), &constraint(), &client)
                .unwrap();
        assert_eq!(summary.next_action, "esperar");
        assert_eq!(summary.next_action_repair, RepairAction::QuoteStripped);
    }

    #[test]
    fn test_summary_defaults_unknown_action() {
        let client = MockClient {
            response: r#"{"resumen":"ok","siguiente_accion":"escalate_to_mars"}"#.to_string(),
        };
        let summary =
            summarize_with_client(&transcript(), &classification(), &constraint(), &client)
                .unwrap();
        assert_eq!(summary.next_action, "N/A");
        assert_eq!(summary.next_action_repair, RepairAction::Defaulted);
    }

    #[test]
    fn test_summary_accepts_embedded_json() {
        let client = MockClient {
            response: "```json\n{\"resumen\":\"ok\",\"siguiente_accion\":\"cerrar\"}\n```"
                .to_string(),
        };
        let summary =
            summarize_with_client(&transcript(), &classification(), &constraint(), &client)
                .unwrap();
        assert_eq!(summary.next_action, "cerrar");
    }

    #[test]
    fn test_summary_missing_action_defaults() {
        let client = MockClient {
            response: r#"{"resumen":"sin recomendacion"}"#.to_string(),
        };
        let summary =
            summarize_with_client(&transcript(), &classification(), &constraint(), &client)
                .unwrap();
        assert_eq!(summary.next_action, "N/A");
        assert_eq!(summary.next_action_repair, RepairAction::Defaulted);
    }

    #[test]
    fn test_prompt_includes_allowed_values_and_flags() {
        let prompt = build_prompt(&transcript(), &classification(), &constraint());
        assert!(prompt.contains("llamar, esperar, enviar_plantilla, cerrar"));
        assert!(prompt.contains("handoff=accepted"));
    }
}
