use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const EDIT_MODEL: &str = "code-davinci-edit-001";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Capability flags nested in a model record. The listing endpoint omits
/// flags it does not know about, so every one is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPermission {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_create_engine: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_sampling: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_logprobs: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_search_indices: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_view: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_fine_tuning: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    #[serde(default)]
    pub object: String,
    pub created: u64,
    pub owned_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<ModelPermission>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<Model>,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    text: String,
}

/// Blocking client for the model-serving API. One synchronous request per
/// call; no retries, no batching.
pub struct Client {
    agent: ureq::Agent,
    api_key: String,
    base_url: String,
}

impl Client {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Point the client at a different endpoint (tests, proxies).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key)
    }

    /// Submit one function's source text with an instruction and return the
    /// generated text (`choices[0].text`).
    pub fn generate(&self, code: &str, instruction: &str) -> Result<String> {
        let url = format!("{}/edits", self.base_url);
        let response = self
            .agent
            .post(&url)
            .set("Authorization", &self.bearer())
            .send_json(serde_json::json!({
                "model": EDIT_MODEL,
                "input": code,
                "instruction": instruction,
            }))
            .with_context(|| format!("POST {url} failed"))?;

        let body = response
            .into_string()
            .with_context(|| format!("reading response body from {url}"))?;
        parse_generation(&body)
    }

    /// List the models available to this credential.
    pub fn list_models(&self) -> Result<Vec<Model>> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .agent
            .get(&url)
            .set("Authorization", &self.bearer())
            .call()
            .with_context(|| format!("GET {url} failed"))?;

        let list: ModelList = response
            .into_json()
            .context("malformed model list response")?;
        Ok(list.data)
    }
}

/// Extract `choices[0].text` from a generation response body.
///
/// Missing or mistyped fields are a malformed-response error, never a panic;
/// the caller reports it and moves on to the next match.
pub fn parse_generation(body: &str) -> Result<String> {
    let parsed: GenerationResponse =
        serde_json::from_str(body).context("malformed generation response")?;
    parsed
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.text)
        .ok_or_else(|| anyhow!("malformed generation response: empty choices list"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_choice_text() {
        let body = r#"{
            "object": "edit",
            "created": 1700000000,
            "choices": [
                { "text": "/** Adds two ints. */", "index": 0 },
                { "text": "ignored second choice", "index": 1 }
            ]
        }"#;
        assert_eq!(parse_generation(body).unwrap(), "/** Adds two ints. */");
    }

    #[test]
    fn empty_choices_is_malformed() {
        let err = parse_generation(r#"{"choices": []}"#).unwrap_err();
        assert!(err.to_string().contains("malformed"), "err: {err:#}");
    }

    #[test]
    fn missing_fields_are_malformed_not_a_panic() {
        for body in [
            "{}",
            r#"{"choices": [{}]}"#,
            r#"{"choices": [{"text": 42}]}"#,
            "not json at all",
        ] {
            let err = parse_generation(body).unwrap_err();
            assert!(err.to_string().contains("malformed"), "body {body}: {err:#}");
        }
    }

    #[test]
    fn model_list_deserializes_with_and_without_permissions() {
        let body = r#"{
            "object": "list",
            "data": [
                {
                    "id": "code-davinci-edit-001",
                    "object": "model",
                    "created": 1649880484,
                    "owned_by": "openai",
                    "permissions": {
                        "id": "modelperm-abc",
                        "allow_sampling": true,
                        "allow_view": false
                    }
                },
                {
                    "id": "babbage",
                    "created": 1649358449,
                    "owned_by": "openai"
                }
            ]
        }"#;

        let list: ModelList = serde_json::from_str(body).unwrap();
        assert_eq!(list.data.len(), 2);
        assert_eq!(list.data[0].id, "code-davinci-edit-001");
        let perms = list.data[0].permissions.as_ref().unwrap();
        assert_eq!(perms.allow_sampling, Some(true));
        assert_eq!(perms.allow_view, Some(false));
        assert_eq!(perms.allow_fine_tuning, None);
        assert!(list.data[1].permissions.is_none());
    }
}
