// Adaptive quiz library entry
// 出题管线、难度奖励与知识点掌握度追踪。

pub mod answer_service;
pub mod config;
pub mod difficulty_reward;
pub mod knowledge_graph;
pub mod llm_manager;
pub mod models;
pub mod question_pipeline;
pub mod storage;
pub mod utils;

pub use answer_service::{AnswerOutcome, AnswerService, AnswerSubmission};
pub use crate::config::QuizConfig;
pub use difficulty_reward::DifficultyRewardEngine;
pub use llm_manager::{CompletionClient, CompletionError, OllamaClient};
pub use models::{AppError, AppErrorType, Question, QuestionSource};
pub use question_pipeline::{QuestionPipeline, QuestionPipelineDeps};
pub use storage::{MemoryStore, QuizStore, SqliteStore};

use tracing_subscriber::EnvFilter;

/// 安装全局 tracing 订阅者；`RUST_LOG` 未设置时默认 `info`。
///
/// 重复调用不会报错，已安装时直接返回。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_err()
    {
        tracing::debug!("tracing subscriber already installed");
    }
}
