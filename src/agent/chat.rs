//! Chat-style wire protocol.
//!
//! Request: a flat `messages` array of `{role, content}` objects, POSTed to
//! `/v1/chat/completions` with Bearer authentication. Response text lives at
//! `choices[0].message.content`, token counters under `usage`.

use super::{trim_base, AgentError, Completion, GenerationParams, Turn, Usage, WireAdapter};
use reqwest::RequestBuilder;
use serde::Deserialize;
use serde_json::{json, Value};

pub struct ChatAdapter;

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl WireAdapter for ChatAdapter {
    fn endpoint(&self, base_url: &str, _model: &str) -> String {
        format!("{}/v1/chat/completions", trim_base(base_url))
    }

    fn authorize(&self, request: RequestBuilder, api_key: Option<&str>) -> RequestBuilder {
        match api_key {
            Some(key) => request.header("authorization", format!("Bearer {}", key)),
            None => request,
        }
    }

    fn encode(&self, turns: &[Turn], model: &str, params: &GenerationParams) -> Value {
        let messages: Vec<Value> = turns
            .iter()
            .map(|t| json!({"role": t.role.as_str(), "content": t.text}))
            .collect();

        let mut body = json!({"model": model, "messages": messages});
        if let Some(temperature) = params.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = params.max_output_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        body
    }

    fn decode(&self, body: &[u8]) -> Result<Completion, AgentError> {
        let response: ChatResponse = serde_json::from_slice(body).map_err(|e| {
            AgentError::InvalidResponse(format!("Failed to parse chat response: {}", e))
        })?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                AgentError::InvalidResponse("missing choices[0].message.content".to_string())
            })?;

        let usage = response.usage.map(|u| Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(Completion { text, usage })
    }
}
