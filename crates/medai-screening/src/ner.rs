//! Clinical entity recognition and post-processing.

use crate::error::NerError;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::LazyLock;
use std::time::Duration;

/// Default minimum entity score kept by [`ClinicalSections::from_entities`].
pub const DEFAULT_MIN_SCORE: f64 = 0.6;

static CAMEL_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z])([A-Z])").expect("Invalid camel-case regex"));
static NON_LETTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z\s]").expect("Invalid letter regex"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid whitespace regex"));

/// One aggregated entity returned by the token-classification model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NerEntity {
    #[serde(default)]
    pub entity_group: String,
    #[serde(default)]
    pub score: f64,
    pub word: String,
}

/// Comma-joined clinical terms grouped by section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicalSections {
    pub symptoms: String,
    pub medicines: String,
    pub tests: String,
}

#[derive(Clone, Copy)]
enum Section {
    Symptoms,
    Medicines,
    Tests,
}

fn section_for(label: &str) -> Option<Section> {
    match label.to_ascii_uppercase().as_str() {
        "PROBLEM" | "SIGN" | "DISEASE" => Some(Section::Symptoms),
        "DRUG" | "TREATMENT" => Some(Section::Medicines),
        "TEST" | "LAB" => Some(Section::Tests),
        _ => None,
    }
}

fn normalize_word(raw: &str) -> String {
    let split = CAMEL_BOUNDARY.replace_all(raw, "$1 $2");
    let letters = NON_LETTER.replace_all(&split, " ");
    WHITESPACE
        .replace_all(&letters, " ")
        .trim()
        .to_lowercase()
}

fn join_sorted(terms: BTreeSet<String>) -> String {
    terms.into_iter().collect::<Vec<_>>().join(", ")
}

impl ClinicalSections {
    /// Groups confident entities into sections of unique, sorted tokens.
    ///
    /// Entities below `min_score` or with an unmapped label are dropped.
    /// Words are split on camel-case boundaries and non-letters; tokens
    /// shorter than three characters are discarded.
    pub fn from_entities(entities: &[NerEntity], min_score: f64) -> Self {
        let mut symptoms = BTreeSet::new();
        let mut medicines = BTreeSet::new();
        let mut tests = BTreeSet::new();

        for entity in entities {
            if entity.score < min_score {
                continue;
            }
            let Some(section) = section_for(&entity.entity_group) else {
                continue;
            };
            let target = match section {
                Section::Symptoms => &mut symptoms,
                Section::Medicines => &mut medicines,
                Section::Tests => &mut tests,
            };
            for token in normalize_word(&entity.word).split(' ') {
                if token.chars().count() >= 3 {
                    target.insert(token.to_string());
                }
            }
        }

        Self {
            symptoms: join_sorted(symptoms),
            medicines: join_sorted(medicines),
            tests: join_sorted(tests),
        }
    }
}

/// Token-classification backend.
#[async_trait]
pub trait EntityRecognizer: Send + Sync {
    async fn recognize(&self, text: &str) -> Result<Vec<NerEntity>, NerError>;
}

/// Client for a hosted HuggingFace token-classification endpoint.
#[derive(Debug, Clone)]
pub struct HttpEntityRecognizer {
    client: reqwest::Client,
    endpoint: String,
    api_token: Option<String>,
}

#[derive(Serialize)]
struct NerRequest<'a> {
    inputs: &'a str,
    parameters: NerParameters,
}

#[derive(Serialize)]
struct NerParameters {
    aggregation_strategy: &'static str,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NerResponse {
    Entities(Vec<NerEntity>),
    Error { error: String },
}

impl HttpEntityRecognizer {
    pub fn new(
        endpoint: impl Into<String>,
        api_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, NerError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_token,
        })
    }
}

#[async_trait]
impl EntityRecognizer for HttpEntityRecognizer {
    async fn recognize(&self, text: &str) -> Result<Vec<NerEntity>, NerError> {
        let mut request = self.client.post(&self.endpoint).json(&NerRequest {
            inputs: text,
            parameters: NerParameters {
                aggregation_strategy: "first",
            },
        });
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body: NerResponse = response
            .json()
            .await
            .map_err(|e| NerError::InvalidResponse(e.to_string()))?;

        match body {
            NerResponse::Entities(entities) if status.is_success() => Ok(entities),
            NerResponse::Entities(_) => Err(NerError::Service(format!("HTTP {status}"))),
            NerResponse::Error { error } => Err(NerError::Service(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn entity(group: &str, score: f64, word: &str) -> NerEntity {
        NerEntity {
            entity_group: group.to_string(),
            score,
            word: word.to_string(),
        }
    }

    #[test]
    fn groups_and_sorts_tokens() {
        let sections = ClinicalSections::from_entities(
            &[
                entity("problem", 0.91, "chest pain"),
                entity("SIGN", 0.88, "Fever"),
                entity("DRUG", 0.95, "Metformin500"),
                entity("TREATMENT", 0.72, "insulinTherapy"),
                entity("LAB", 0.8, "HbA1c"),
                entity("TEST", 0.81, "lipid-profile"),
            ],
            DEFAULT_MIN_SCORE,
        );
        assert_eq!(sections.symptoms, "chest, fever, pain");
        assert_eq!(sections.medicines, "insulin, metformin, therapy");
        assert_eq!(sections.tests, "lipid, profile");
    }

    #[test]
    fn drops_low_scores_short_tokens_and_unknown_labels() {
        let sections = ClinicalSections::from_entities(
            &[
                entity("DISEASE", 0.59, "asthma"),
                entity("DISEASE", 0.9, "IV Flu"),
                entity("PERSON", 0.99, "Rahima"),
                entity("DISEASE", 0.9, "flu"),
            ],
            DEFAULT_MIN_SCORE,
        );
        assert_eq!(sections.symptoms, "flu");
        assert_eq!(sections.medicines, "");
        assert_eq!(sections.tests, "");
    }

    #[tokio::test]
    async fn http_recognizer_posts_text_and_parses_entities() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer hf-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"entity_group": "DRUG", "score": 0.97, "word": "paracetamol", "start": 0, "end": 11}
            ])))
            .mount(&server)
            .await;

        let recognizer = HttpEntityRecognizer::new(
            server.uri(),
            Some("hf-token".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();
        let entities = recognizer.recognize("paracetamol 500mg").await.unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].entity_group, "DRUG");
    }

    #[tokio::test]
    async fn http_recognizer_surfaces_service_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(503)
                    .set_body_json(serde_json::json!({"error": "Model is loading"})),
            )
            .mount(&server)
            .await;

        let recognizer =
            HttpEntityRecognizer::new(server.uri(), None, Duration::from_secs(5)).unwrap();
        let err = recognizer.recognize("text").await.unwrap_err();
        assert!(matches!(err, NerError::Service(msg) if msg == "Model is loading"));
    }
}
