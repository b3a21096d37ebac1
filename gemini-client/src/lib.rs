use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use famebot_core::{CoreError, LlmError, Subject};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

// Generation settings are fixed; only the model name is configurable.
const TEMPERATURE: f64 = 1.0;
const TOP_P: f64 = 0.95;
const TOP_K: i32 = 64;
const MAX_OUTPUT_TOKENS: u32 = 8192;
const RESPONSE_MIME_TYPE: &str = "text/plain";

const SAFETY_THRESHOLD: &str = "BLOCK_MEDIUM_AND_ABOVE";
const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

// Style template the model is steered with. The single-`#` separator rule
// is what the thread poster later splits on, so the two must stay in sync.
const SYSTEM_INSTRUCTION: &str = "
1. Use a friendly and conversational tone.
2. Structure each post with a headline, body, hashtags, call to action or fact, and sources.
3. Headline format: \"How [Name] Rose to Fame: [Key Point]\"
4. Body format: \"Did you know [Name] got famous by [brief explanation]? [Additional detail].\"
5. End an intriguing fact.
6. Example post:
   - Headline: \"How Emma Stone Rose to Fame: Breakthrough Role in 'Easy A'\"
   - Body: \"

Did you know Emma Stone got famous by starring in the hit comedy 'Easy A'? This role showcased her comedic talent and catapulted her to stardom, leading to major roles in films like 'La La Land' and 'The Amazing Spider-Man'.\"
   - Fun fact Fact: \"

Fun fact: Emma Stone changed her name from Emily to Emma because of the Screen Actors Guild!\" 
7. This is a twitter tweet, so markdown syntax does not work. Separate the headline, body, and fact with a single #
8. Make sure the body is NEVER over 280 characters.
";

/// Seam between the bot loop and the text-generation service. Tests drive
/// the loop with a scripted implementation instead of the live API.
pub trait ContentGenerator {
    async fn generate(&self, subject: &Subject) -> Result<String, CoreError>;
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
}

/// Typed wrapper around the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    http_client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            config,
        }
    }
}

impl ContentGenerator for GeminiClient {
    async fn generate(&self, subject: &Subject) -> Result<String, CoreError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            GEMINI_API_BASE, self.config.model, self.config.api_key
        );
        let request = build_request(subject);

        info!(
            "Requesting thread copy for {} from {}",
            subject.name, self.config.model
        );
        let start_time = Instant::now();

        let response = match self.http_client.post(&url).json(&request).send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Network error calling Gemini: {}", e);
                if e.is_timeout() {
                    return Err(CoreError::Llm(LlmError::RequestTimeout {
                        provider: "gemini".to_string(),
                    }));
                }
                return Err(CoreError::Network(e));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = error_detail(&body).unwrap_or_else(|| format!("HTTP {}", status));
            error!("Gemini request failed ({}): {}", status, detail);
            return Err(map_error_status(status, &self.config.model, detail));
        }

        let payload: GenerateContentResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            CoreError::Llm(LlmError::InvalidResponseFormat {
                provider: "gemini".to_string(),
            })
        })?;

        let text = extract_text(payload)?;
        debug!(
            "Gemini returned {} characters in {:?}",
            text.len(),
            start_time.elapsed()
        );
        Ok(text)
    }
}

fn prompt_for(subject: &Subject) -> String {
    format!("How did {} become famous?", subject.name)
}

fn build_request(subject: &Subject) -> GenerateContentRequest {
    let user_turn = Content {
        role: Some("user".to_string()),
        parts: vec![Part {
            text: prompt_for(subject),
        }],
    };

    GenerateContentRequest {
        system_instruction: Content {
            role: None,
            parts: vec![Part {
                text: SYSTEM_INSTRUCTION.to_string(),
            }],
        },
        // The chat is seeded with the question as history and then asked
        // again, so the request carries two identical user turns.
        contents: vec![user_turn.clone(), user_turn],
        generation_config: GenerationConfig {
            temperature: TEMPERATURE,
            top_p: TOP_P,
            top_k: TOP_K,
            max_output_tokens: MAX_OUTPUT_TOKENS,
            response_mime_type: RESPONSE_MIME_TYPE,
        },
        safety_settings: SAFETY_CATEGORIES
            .iter()
            .map(|&category| SafetySetting {
                category,
                threshold: SAFETY_THRESHOLD,
            })
            .collect(),
    }
}

fn map_error_status(status: StatusCode, model: &str, detail: String) -> CoreError {
    let error = match status.as_u16() {
        400 => LlmError::InvalidPrompt { reason: detail },
        401 | 403 => LlmError::AuthenticationFailed {
            provider: "gemini".to_string(),
        },
        404 => LlmError::ModelNotAvailable {
            model: model.to_string(),
        },
        429 => LlmError::RateLimitExceeded {
            provider: "gemini".to_string(),
            retry_after: 60,
        },
        _ if status.is_server_error() => LlmError::ServiceUnavailable {
            provider: "gemini".to_string(),
        },
        _ => LlmError::InvalidResponseFormat {
            provider: "gemini".to_string(),
        },
    };
    CoreError::Llm(error)
}

fn error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

fn extract_text(response: GenerateContentResponse) -> Result<String, CoreError> {
    if let Some(feedback) = response.prompt_feedback {
        if let Some(reason) = feedback.block_reason {
            error!("Gemini blocked the prompt: {}", reason);
            return Err(CoreError::Llm(LlmError::ContentFiltered { reason }));
        }
    }

    let candidate = response.candidates.into_iter().next().ok_or_else(|| {
        CoreError::Llm(LlmError::InvalidResponseFormat {
            provider: "gemini".to_string(),
        })
    })?;

    if candidate.finish_reason.as_deref() == Some("SAFETY") {
        error!("Gemini dropped the candidate for safety reasons");
        return Err(CoreError::Llm(LlmError::ContentFiltered {
            reason: "SAFETY".to_string(),
        }));
    }

    let parts = candidate
        .content
        .map(|content| content.parts)
        .unwrap_or_default();
    if parts.is_empty() {
        return Err(CoreError::Llm(LlmError::InvalidResponseFormat {
            provider: "gemini".to_string(),
        }));
    }

    Ok(parts.into_iter().map(|part| part.text).collect())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    top_p: f64,
    top_k: i32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}
