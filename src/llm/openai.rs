use super::{strip_echo, Oracle};
use crate::config::OracleConfig;
use anyhow::{anyhow, Context, Result};
use async_openai::{
    config::OpenAIConfig,
    types::{ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs},
    Client,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, warn};

const SAMPLING_TEMPERATURE: f32 = 0.5;

/// Oracle backed by an OpenAI-compatible chat endpoint (vLLM, TGI, hosted).
pub struct OracleClient {
    client: Client<OpenAIConfig>,
    model: String,
    limiter: DefaultDirectRateLimiter,
    max_retries: u32,
}

impl OracleClient {
    pub fn new(cfg: &OracleConfig) -> Result<Self> {
        let mut api = OpenAIConfig::default();
        if let Some(url) = &cfg.base_url { api = api.with_api_base(url); }
        if let Some(key) = &cfg.api_key { api = api.with_api_key(key); }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .context("building HTTP client")?;
        let qps = NonZeroU32::new(cfg.requests_per_second).unwrap_or(NonZeroU32::MIN);
        Ok(Self {
            client: Client::with_config(api).with_http_client(http),
            model: cfg.model.clone(),
            limiter: RateLimiter::direct(Quota::per_second(qps)),
            max_retries: cfg.max_retries.max(1),
        })
    }

    async fn complete_once(&self, prompt: &str, max_new_tokens: u32, deterministic: bool) -> Result<String> {
        self.limiter.until_ready().await;
        let user: ChatCompletionRequestMessage = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt.to_string())
            .build()?
            .into();
        let req = CreateChatCompletionRequestArgs::default()
            .model(self.model.clone())
            .messages(vec![user])
            .max_tokens(max_new_tokens)
            .temperature(if deterministic { 0.0 } else { SAMPLING_TEMPERATURE })
            .build()?;
        let resp = self.client.chat().create(req).await?;
        let text = resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("oracle returned no content"))?;
        Ok(strip_echo(&text, prompt).to_string())
    }
}

#[async_trait::async_trait]
impl Oracle for OracleClient {
    async fn generate(&self, prompt: &str, max_new_tokens: u32, deterministic: bool) -> Result<String> {
        let mut attempt = 0;
        loop {
            match self.complete_once(prompt, max_new_tokens, deterministic).await {
                Ok(text) => {
                    debug!(tokens = max_new_tokens, chars = text.len(), "oracle call ok");
                    return Ok(text);
                }
                Err(e) if attempt + 1 < self.max_retries => {
                    let delay = Duration::from_secs(2u64.pow(attempt));
                    warn!(error = %e, ?delay, "oracle call failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.context(format!("oracle call failed after {} attempts", attempt + 1))),
            }
        }
    }

    async fn health_check(&self) -> Result<()> {
        self.client
            .models()
            .list()
            .await
            .map(|_| ())
            .with_context(|| format!("oracle endpoint unreachable (model {})", self.model))
    }
}
