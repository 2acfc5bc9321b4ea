/// 出题管线 - 类型定义
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::QuestionSource;

// ============================================================================
// 候选题目
// ============================================================================

/// 尚未持久化的候选题目
///
/// 从模型输出解析、数学校正或兜底生成得到，只有通过结构校验后才会落库。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionCandidate {
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub difficulty: u8,
    pub subject: String,
    pub source: QuestionSource,
}

impl QuestionCandidate {
    /// 正确答案在选项中的位置（按值查找）
    pub fn correct_index(&self) -> Option<usize> {
        self.options.iter().position(|o| *o == self.correct_answer)
    }
}

// ============================================================================
// 可恢复的失败原因（只用于日志，随后走兜底）
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionFailure {
    #[error("completion text is empty")]
    EmptyInput,

    #[error("no question stem found")]
    MissingStem,

    #[error("expected 4 choices, found {found}")]
    TooFewChoices { found: usize },

    #[error("no correct-answer label found")]
    MissingAnswer,

    #[error("correct letter {letter} does not match any extracted choice")]
    UnresolvedLetter { letter: char },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("stem too short ({chars} chars)")]
    StemTooShort { chars: usize },

    #[error("expected 4 options, got {count}")]
    WrongOptionCount { count: usize },

    #[error("option {index} is empty")]
    EmptyOption { index: usize },

    #[error("duplicate option: {value}")]
    DuplicateOption { value: String },

    #[error("correct answer {answer:?} is not one of the options")]
    AnswerNotInOptions { answer: String },
}
