use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::kv::{KvClient, KvError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// [`KvClient`] over the Redis-over-HTTP protocol used by Upstash / Vercel KV:
/// each command is POSTed as a JSON array, answered with `{"result": ..}` or
/// `{"error": ".."}`.
#[derive(Debug, Clone)]
pub struct RestKvClient {
    http: reqwest::Client,
    url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct Reply {
    #[serde(default)]
    result: Value,
    error: Option<String>,
}

impl RestKvClient {
    pub fn new(url: &str, token: &str) -> Result<Self, KvError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            url: url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    async fn command(&self, args: Value) -> Result<Value, KvError> {
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&args)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        let reply: Reply = serde_json::from_str(&body).map_err(|_| {
            let snippet: String = body.chars().take(200).collect();
            KvError::UnexpectedResponse(format!("HTTP {}: {}", status, snippet))
        })?;
        if let Some(err) = reply.error {
            return Err(KvError::Remote(err));
        }
        if !status.is_success() {
            return Err(KvError::UnexpectedResponse(format!("HTTP {}", status)));
        }
        Ok(reply.result)
    }
}

#[async_trait]
impl KvClient for RestKvClient {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        match self.command(json!(["GET", key])).await? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            // Some clients store already-decoded JSON.
            other => Ok(Some(other.to_string())),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        match self.command(json!(["SET", key, value])).await? {
            Value::String(s) if s == "OK" => Ok(()),
            other => Err(KvError::UnexpectedResponse(format!("SET returned {}", other))),
        }
    }

    async fn del(&self, key: &str) -> Result<bool, KvError> {
        match self.command(json!(["DEL", key])).await? {
            Value::Number(n) => Ok(n.as_u64().unwrap_or(0) > 0),
            other => Err(KvError::UnexpectedResponse(format!("DEL returned {}", other))),
        }
    }
}
