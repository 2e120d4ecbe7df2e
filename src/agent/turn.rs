//! Turn-style wire protocol.
//!
//! Request: `contents` of `{role: "user"|"model", parts: [{text}]}`, system turns
//! folded into a top-level `systemInstruction`, and a separate
//! `generationConfig` object. POSTed to `/v1beta/models/{model}:generateContent`
//! with the key as a query parameter. Response text is the concatenation of
//! `candidates[0].content.parts[*].text`.

use super::{
    trim_base, AgentError, Completion, GenerationParams, Role, Turn, Usage, WireAdapter,
};
use reqwest::RequestBuilder;
use serde::Deserialize;
use serde_json::{json, Map, Value};

pub struct TurnAdapter;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TurnResponse {
    #[serde(default)]
    candidates: Vec<TurnCandidate>,
    usage_metadata: Option<TurnUsage>,
}

#[derive(Deserialize)]
struct TurnCandidate {
    content: Option<TurnContent>,
}

#[derive(Deserialize)]
struct TurnContent {
    #[serde(default)]
    parts: Vec<TurnPart>,
}

#[derive(Deserialize)]
struct TurnPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TurnUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

impl WireAdapter for TurnAdapter {
    fn endpoint(&self, base_url: &str, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            trim_base(base_url),
            model
        )
    }

    fn authorize(&self, request: RequestBuilder, api_key: Option<&str>) -> RequestBuilder {
        match api_key {
            Some(key) => request.query(&[("key", key)]),
            None => request,
        }
    }

    fn encode(&self, turns: &[Turn], _model: &str, params: &GenerationParams) -> Value {
        let system: Vec<&str> = turns
            .iter()
            .filter(|t| t.role == Role::System)
            .map(|t| t.text.as_str())
            .collect();

        // Map "assistant" to "model"
        let contents: Vec<Value> = turns
            .iter()
            .filter(|t| t.role != Role::System)
            .map(|t| {
                let role = match t.role {
                    Role::Assistant => "model",
                    _ => "user",
                };
                json!({"role": role, "parts": [{"text": t.text}]})
            })
            .collect();

        let mut generation_config = Map::new();
        if let Some(temperature) = params.temperature {
            generation_config.insert("temperature".to_string(), json!(temperature));
        }
        if let Some(max_tokens) = params.max_output_tokens {
            generation_config.insert("maxOutputTokens".to_string(), json!(max_tokens));
        }

        let mut body = json!({
            "contents": contents,
            "generationConfig": generation_config,
        });
        if !system.is_empty() {
            body["systemInstruction"] = json!({"parts": [{"text": system.join("\n")}]});
        }
        body
    }

    fn decode(&self, body: &[u8]) -> Result<Completion, AgentError> {
        let response: TurnResponse = serde_json::from_slice(body).map_err(|e| {
            AgentError::InvalidResponse(format!("Failed to parse turn response: {}", e))
        })?;

        let parts = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts)
            .filter(|parts| parts.iter().any(|p| p.text.is_some()))
            .ok_or_else(|| {
                AgentError::InvalidResponse("missing candidates[0].content.parts".to_string())
            })?;

        let text = parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect::<Vec<String>>()
            .join("");

        let usage = response.usage_metadata.map(|u| Usage {
            input_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });

        Ok(Completion { text, usage })
    }
}
