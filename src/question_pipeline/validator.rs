//! 结构校验闸门
//!
//! 只看形状，不做任何学科推理；任何一项不满足即拒绝（fail closed）。

use std::collections::HashSet;

use super::types::{QuestionCandidate, ValidationFailure};
use crate::models::OPTION_COUNT;

/// 题干最少字符数（严格大于）
pub const MIN_STEM_CHARS: usize = 5;

pub fn validate(candidate: &QuestionCandidate) -> Result<(), ValidationFailure> {
    let chars = candidate.text.trim().chars().count();
    if chars <= MIN_STEM_CHARS {
        return Err(ValidationFailure::StemTooShort { chars });
    }

    if candidate.options.len() != OPTION_COUNT {
        return Err(ValidationFailure::WrongOptionCount {
            count: candidate.options.len(),
        });
    }

    let mut seen = HashSet::with_capacity(OPTION_COUNT);
    for (index, option) in candidate.options.iter().enumerate() {
        if option.trim().is_empty() {
            return Err(ValidationFailure::EmptyOption { index });
        }
        if !seen.insert(option.as_str()) {
            return Err(ValidationFailure::DuplicateOption {
                value: option.clone(),
            });
        }
    }

    if !candidate.options.contains(&candidate.correct_answer) {
        return Err(ValidationFailure::AnswerNotInOptions {
            answer: candidate.correct_answer.clone(),
        });
    }

    Ok(())
}
