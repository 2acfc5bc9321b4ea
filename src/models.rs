use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::storage::StoreError;

/// 每道题固定的选项数量
pub const OPTION_COUNT: usize = 4;

/// 难度下限
pub const MIN_DIFFICULTY: u8 = 1;

/// 难度上限
pub const MAX_DIFFICULTY: u8 = 10;

// ============================================================================
// 题目
// ============================================================================

/// 题目来源标记
///
/// 状态迁移：`ai → ai-corrected`（数学校正），`ai | ai-corrected → fallback`（彻底失败）。
/// `fallback` 为吸收态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionSource {
    Ai,
    AiCorrected,
    Fallback,
}

/// 校验流水线对候选题目产生的事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEvent {
    /// 校验通过（或豁免），来源不变
    Confirmed,
    /// 答案被重算并改写
    Corrected,
    /// 无法挽救，改用兜底题
    Rejected,
}

impl QuestionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionSource::Ai => "ai",
            QuestionSource::AiCorrected => "ai-corrected",
            QuestionSource::Fallback => "fallback",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ai" => Some(QuestionSource::Ai),
            "ai-corrected" => Some(QuestionSource::AiCorrected),
            "fallback" => Some(QuestionSource::Fallback),
            _ => None,
        }
    }

    /// 纯函数、全定义的状态迁移
    pub fn transition(self, event: SourceEvent) -> Self {
        match (self, event) {
            (QuestionSource::Fallback, _) => QuestionSource::Fallback,
            (_, SourceEvent::Rejected) => QuestionSource::Fallback,
            (QuestionSource::Ai, SourceEvent::Corrected) => QuestionSource::AiCorrected,
            (current, _) => current,
        }
    }

    /// 是否由模型生成（需要在持久化前打乱选项）
    pub fn is_ai(&self) -> bool {
        matches!(self, QuestionSource::Ai | QuestionSource::AiCorrected)
    }
}

impl fmt::Display for QuestionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 已持久化的选择题
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub difficulty: u8,
    pub subject: String,
    pub source: QuestionSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Question {
    /// 正确性只按字符串值比较，从不按位置
    pub fn is_correct_answer(&self, answer: &str) -> bool {
        self.correct_answer == answer
    }
}

/// 把任意难度输入（可能是 5.7、NaN、42）规整到 1-10 的整数档位
pub fn normalize_difficulty(difficulty: f64) -> u8 {
    if !difficulty.is_finite() {
        return MIN_DIFFICULTY;
    }
    difficulty
        .round()
        .clamp(MIN_DIFFICULTY as f64, MAX_DIFFICULTY as f64) as u8
}

pub fn is_math_subject(subject: &str) -> bool {
    matches!(
        subject.trim().to_lowercase().as_str(),
        "math" | "maths" | "mathematics"
    )
}

// ============================================================================
// 结构化错误处理
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AppErrorType {
    Validation,
    Database,
    LLM,
    NotFound,
    Configuration,
    Network,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppError {
    pub error_type: AppErrorType,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl AppError {
    pub fn new(error_type: AppErrorType, message: impl Into<String>) -> Self {
        Self {
            error_type,
            message: message.into(),
            details: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(AppErrorType::Validation, message)
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(AppErrorType::Database, message)
    }

    pub fn llm(message: impl Into<String>) -> Self {
        Self::new(AppErrorType::LLM, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(AppErrorType::NotFound, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(AppErrorType::Configuration, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(AppErrorType::Network, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(AppErrorType::Unknown, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => AppError::not_found(err.to_string()),
            other => AppError::database(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::unknown(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::validation(format!("JSON serialization error: {}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_transition_is_total() {
        let sources = [
            QuestionSource::Ai,
            QuestionSource::AiCorrected,
            QuestionSource::Fallback,
        ];
        let events = [
            SourceEvent::Confirmed,
            SourceEvent::Corrected,
            SourceEvent::Rejected,
        ];
        for source in sources {
            for event in events {
                // 每个组合都必须有定义，且拒绝事件总是落到 fallback
                let next = source.transition(event);
                if event == SourceEvent::Rejected {
                    assert_eq!(next, QuestionSource::Fallback);
                }
            }
        }
    }

    #[test]
    fn test_source_transitions() {
        assert_eq!(
            QuestionSource::Ai.transition(SourceEvent::Confirmed),
            QuestionSource::Ai
        );
        assert_eq!(
            QuestionSource::Ai.transition(SourceEvent::Corrected),
            QuestionSource::AiCorrected
        );
        assert_eq!(
            QuestionSource::AiCorrected.transition(SourceEvent::Confirmed),
            QuestionSource::AiCorrected
        );
        assert_eq!(
            QuestionSource::Fallback.transition(SourceEvent::Corrected),
            QuestionSource::Fallback
        );
    }

    #[test]
    fn test_source_serde_names() {
        let json = serde_json::to_string(&QuestionSource::AiCorrected).unwrap();
        assert_eq!(json, "\"ai-corrected\"");
        assert_eq!(
            QuestionSource::from_str("fallback"),
            Some(QuestionSource::Fallback)
        );
        assert_eq!(QuestionSource::from_str("human"), None);
    }

    #[test]
    fn test_normalize_difficulty() {
        assert_eq!(normalize_difficulty(0.2), 1);
        assert_eq!(normalize_difficulty(5.4), 5);
        assert_eq!(normalize_difficulty(5.5), 6);
        assert_eq!(normalize_difficulty(42.0), 10);
        assert_eq!(normalize_difficulty(f64::NAN), 1);
    }

    #[test]
    fn test_store_error_maps_to_app_error() {
        let err: AppError = StoreError::NotFound {
            resource_type: "Question".to_string(),
            id: "q-1".to_string(),
        }
        .into();
        assert_eq!(err.error_type, AppErrorType::NotFound);

        let err: AppError = StoreError::Database("disk full".to_string()).into();
        assert_eq!(err.error_type, AppErrorType::Database);
        assert!(err.message.contains("disk full"));
    }
}
