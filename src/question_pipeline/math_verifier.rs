//! 数学题复核
//!
//! 对已通过结构校验的模型题目重算答案：
//! - 二次方程 / 对数 / 三角 / 导数，或难度 > 7：超出有界检查范围，直接放行
//! - 两数乘法、加法：重算并与声明答案比对
//! - 不一致时尝试同形修正（同题干、改答案），只有全部选项都是数值时才安全
//! - 修正不可行则整体拒绝，由调用方走兜底

use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

use super::math_forms::{matches_value, numeric_value, MathForm};
use super::types::QuestionCandidate;
use crate::models::SourceEvent;

/// 超过该难度的题目不复核
pub const MAX_VERIFIED_DIFFICULTY: u8 = 7;

static RE_EXEMPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:quadratic|logarithms?|log|ln|sin|cos|tan|sine|cosine|tangent|trigonometr\w*|derivatives?|differentiate|d/dx)\b|²",
    )
    .expect("static regex")
});

#[derive(Debug, Clone, PartialEq)]
pub enum VerificationOutcome {
    /// 重算结果与声明答案一致
    Confirmed(QuestionCandidate),
    /// 题型超出检查范围，信任来源
    Exempt(QuestionCandidate),
    /// 题干中没有可识别的有界题型
    Unchecked(QuestionCandidate),
    /// 答案已被改写为重算值
    Corrected {
        candidate: QuestionCandidate,
        declared: String,
        expected: i64,
    },
    /// 无法安全修正
    Rejected { reason: String },
}

impl VerificationOutcome {
    /// 映射为来源状态机事件
    pub fn event(&self) -> SourceEvent {
        match self {
            VerificationOutcome::Corrected { .. } => SourceEvent::Corrected,
            VerificationOutcome::Rejected { .. } => SourceEvent::Rejected,
            _ => SourceEvent::Confirmed,
        }
    }

    pub fn into_candidate(self) -> Option<QuestionCandidate> {
        match self {
            VerificationOutcome::Confirmed(c)
            | VerificationOutcome::Exempt(c)
            | VerificationOutcome::Unchecked(c) => Some(c),
            VerificationOutcome::Corrected { candidate, .. } => Some(candidate),
            VerificationOutcome::Rejected { .. } => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct MathVerifier;

impl MathVerifier {
    pub fn new() -> Self {
        Self
    }

    pub fn is_exempt(stem: &str, difficulty: u8) -> bool {
        difficulty > MAX_VERIFIED_DIFFICULTY || RE_EXEMPT.is_match(stem)
    }

    pub fn verify(&self, candidate: QuestionCandidate) -> VerificationOutcome {
        if Self::is_exempt(&candidate.text, candidate.difficulty) {
            debug!(
                "[MathVerifier] Exempt form or difficulty {}: {}",
                candidate.difficulty, candidate.text
            );
            return VerificationOutcome::Exempt(candidate);
        }

        let form = match MathForm::detect(&candidate.text) {
            Some(form) if form.is_binary() => form,
            _ => return VerificationOutcome::Unchecked(candidate),
        };
        let Some(expected) = form.evaluate() else {
            return VerificationOutcome::Rejected {
                reason: format!("{} overflows", form),
            };
        };

        if matches_value(&candidate.correct_answer, expected) {
            return VerificationOutcome::Confirmed(candidate);
        }

        warn!(
            "[MathVerifier] {} = {}, model declared {:?}",
            form, expected, candidate.correct_answer
        );
        Self::reconstruct(candidate, expected)
    }

    /// 同形修正：期望值已在选项中则改指向它，否则替换原声明答案那一项
    fn reconstruct(mut candidate: QuestionCandidate, expected: i64) -> VerificationOutcome {
        if !candidate.options.iter().all(|o| numeric_value(o).is_some()) {
            return VerificationOutcome::Rejected {
                reason: "non-numeric options cannot be reconstructed".to_string(),
            };
        }

        let declared = candidate.correct_answer.clone();
        if let Some(existing) = candidate
            .options
            .iter()
            .find(|o| matches_value(o, expected))
            .cloned()
        {
            candidate.correct_answer = existing;
        } else {
            let Some(index) = candidate.correct_index() else {
                return VerificationOutcome::Rejected {
                    reason: "declared answer is not among the options".to_string(),
                };
            };
            let value = expected.to_string();
            candidate.options[index] = value.clone();
            candidate.correct_answer = value;
        }

        candidate.source = candidate.source.transition(SourceEvent::Corrected);
        VerificationOutcome::Corrected {
            candidate,
            declared,
            expected,
        }
    }
}
