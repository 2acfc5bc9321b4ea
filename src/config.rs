//! 运行配置
//!
//! 加载顺序（后者覆盖前者）：内置默认值 → 可选 TOML 文件 → `QUIZ__` 前缀环境变量。
//! 加载前会尝试读取 `.env`。
//!
//! ```toml
//! database_path = "data/quiz.db"
//!
//! [completion]
//! base_url = "http://localhost:11434"
//! model = "llama3.1"
//! timeout_secs = 60
//!
//! [mastery]
//! threshold = 0.8
//! ```
//!
//! 环境变量用双下划线分隔层级，例如 `QUIZ__COMPLETION__MODEL=qwen2.5`。

use anyhow::Context;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::difficulty_reward::RewardConfig;

pub const ENV_PREFIX: &str = "QUIZ";

/// 补全接口配置（Ollama 兼容）
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CompletionConfig {
    pub base_url: String,
    pub model: String,
    /// 单次请求超时（秒）；补全调用不允许无界等待
    pub timeout_secs: u64,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub repeat_penalty: f64,
    pub num_predict: u32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.1".to_string(),
            timeout_secs: 60,
            temperature: 0.7,
            top_p: 0.9,
            top_k: 40,
            repeat_penalty: 1.1,
            num_predict: 500,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MasteryConfig {
    /// 掌握度达到该值视为已掌握，同时是前置条件的满足线
    pub threshold: f64,
    pub recommendation_limit: usize,
}

impl Default for MasteryConfig {
    fn default() -> Self {
        Self {
            threshold: 0.8,
            recommendation_limit: 5,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct QuizConfig {
    pub completion: CompletionConfig,
    pub reward: RewardConfig,
    pub mastery: MasteryConfig,
    pub database_path: PathBuf,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            completion: CompletionConfig::default(),
            reward: RewardConfig::default(),
            mastery: MasteryConfig::default(),
            database_path: PathBuf::from("quiz.db"),
        }
    }
}

impl QuizConfig {
    /// 从可选配置文件 + 环境变量加载
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        if let Ok(env_file) = dotenvy::dotenv() {
            debug!("[Config] Loaded env file: {}", env_file.display());
        }

        let mut builder = Config::builder();
        if let Some(path) = path {
            info!("[Config] Reading {}", path.display());
            builder = builder.add_source(File::from(path).required(false));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: QuizConfig = builder
            .build()
            .context("failed to assemble configuration sources")?
            .try_deserialize()
            .context("invalid quiz configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.completion.timeout_secs == 0 {
            anyhow::bail!("completion.timeout_secs must be greater than zero");
        }
        if !(0.0..=1.0).contains(&self.mastery.threshold) {
            anyhow::bail!(
                "mastery.threshold must be within [0, 1], got {}",
                self.mastery.threshold
            );
        }
        Ok(())
    }
}
