use rand::seq::SliceRandom;
use rand::RngCore;

use super::types::QuestionCandidate;

/// 打乱模型题目的选项顺序，消除“正确答案总在 A”的位置偏差。
///
/// 正确答案按字符串值携带，打乱不会改变它。兜底题已由生成器打乱，不经过这里。
#[derive(Debug, Default)]
pub struct ChoiceShuffler;

impl ChoiceShuffler {
    pub fn new() -> Self {
        Self
    }

    pub fn shuffle(&self, mut candidate: QuestionCandidate, rng: &mut dyn RngCore) -> QuestionCandidate {
        candidate.options.shuffle(rng);
        candidate
    }
}
