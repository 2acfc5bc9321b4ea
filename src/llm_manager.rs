//! 文本补全客户端
//!
//! 出题管线只依赖 `CompletionClient` trait；默认实现对接 Ollama 兼容接口：
//! - `POST {base_url}/api/generate`，`stream: false`，读取响应中的 `response` 字段
//! - `GET {base_url}/api/tags`，列出可用模型（连通性探测）
//!
//! 每个请求都带客户端超时。超时、非 2xx、传输错误、响应解析失败都会变成 `CompletionError`，
//! 由管线当作解析失败处理并走兜底。

pub mod prompts;

use reqwest::blocking::{Client, ClientBuilder};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::CompletionConfig;
use crate::models::AppError;
use crate::utils::text::log_preview;

pub use prompts::PromptBuilder;

/// 日志中原始输出的预览长度
const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion request timed out")]
    Timeout,

    #[error("completion endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("completion transport error: {0}")]
    Http(String),

    #[error("failed to decode completion response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CompletionError::Timeout
        } else if err.is_decode() {
            CompletionError::Decode(err.to_string())
        } else {
            CompletionError::Http(err.to_string())
        }
    }
}

impl From<CompletionError> for AppError {
    fn from(err: CompletionError) -> Self {
        match err {
            CompletionError::Timeout | CompletionError::Http(_) => AppError::network(err.to_string()),
            _ => AppError::llm(err.to_string()),
        }
    }
}

/// 阻塞式文本补全
pub trait CompletionClient: Send + Sync {
    fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f64,
    top_p: f64,
    top_k: u32,
    repeat_penalty: f64,
    num_predict: u32,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// 连通性探测结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub connected: bool,
    pub models: Vec<String>,
    pub error: Option<String>,
}

pub struct OllamaClient {
    client: Client,
    config: CompletionConfig,
}

impl OllamaClient {
    pub fn new(config: CompletionConfig) -> Result<Self, AppError> {
        let client = Self::create_http_client(&config)?;
        info!(
            "[OllamaClient] base_url={}, model={}, timeout={}s",
            config.base_url, config.model, config.timeout_secs
        );
        Ok(Self { client, config })
    }

    /// 先尝试 rustls 完整配置，失败后退回只保留超时的最小配置；超时始终生效
    fn create_http_client(config: &CompletionConfig) -> Result<Client, AppError> {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));

        // 显式禁用压缩，避免代理返回 gzip 数据后解析失败
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

        match ClientBuilder::new()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .use_rustls_tls()
            .default_headers(headers.clone())
            .build()
        {
            Ok(client) => Ok(client),
            Err(e) => {
                warn!("[OllamaClient] Full client config failed ({}), using minimal config", e);
                ClientBuilder::new()
                    .timeout(timeout)
                    .default_headers(headers)
                    .build()
                    .map_err(|e| AppError::configuration(format!("HTTP client init failed: {}", e)))
            }
        }
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// 列出可用模型；失败不报错，结果中带上原因
    pub fn probe(&self) -> ProbeResult {
        let result = self
            .client
            .get(self.endpoint("/api/tags"))
            .send()
            .map_err(CompletionError::from)
            .and_then(|resp| {
                let status = resp.status();
                if !status.is_success() {
                    return Err(CompletionError::Status {
                        status: status.as_u16(),
                        body: resp.text().unwrap_or_default(),
                    });
                }
                resp.json::<TagsResponse>()
                    .map_err(|e| CompletionError::Decode(e.to_string()))
            });

        match result {
            Ok(tags) => {
                let models: Vec<String> = tags.models.into_iter().map(|m| m.name).collect();
                info!("[OllamaClient] Connected, models: {}", models.join(", "));
                ProbeResult {
                    connected: true,
                    models,
                    error: None,
                }
            }
            Err(e) => {
                warn!("[OllamaClient] Probe failed: {}", e);
                ProbeResult {
                    connected: false,
                    models: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

impl CompletionClient for OllamaClient {
    fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        debug!(
            "[OllamaClient] Prompt: {}",
            log_preview(prompt, PREVIEW_CHARS)
        );

        let request = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.config.temperature,
                top_p: self.config.top_p,
                top_k: self.config.top_k,
                repeat_penalty: self.config.repeat_penalty,
                num_predict: self.config.num_predict,
            },
        };

        let resp = self
            .client
            .post(self.endpoint("/api/generate"))
            .json(&request)
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            warn!("[OllamaClient] HTTP {}: {}", status, log_preview(&body, PREVIEW_CHARS));
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = resp
            .json()
            .map_err(|e| CompletionError::Decode(e.to_string()))?;
        debug!(
            "[OllamaClient] Response: {}",
            log_preview(&parsed.response, PREVIEW_CHARS)
        );
        Ok(parsed.response)
    }
}
