//! 难度自适应奖励模块
//!
//! 根据一次作答（正误、自评信心、用时、当前难度、连对次数）计算多目标奖励与下一题难度。
//! 这是无状态的启发式打分，不保存任何跨交互的价值函数。
//!
//! ## 奖励公式
//! - 知识项：答对 `0.5 + 0.5 × (d / 10)`，连对 > 2 时再加 `min(0.2, 0.05 × streak)`；答错 `-0.2`
//! - 效率项：仅答对且用时 < 60s 时计算，`optimal = 15 + 4d`，
//!   `max(0, 0.3 × (1 - |1 - t / optimal|))`
//! - 元认知项：信心与结果一致（对且 c > 0.7，或错且 c < 0.4）`+0.3`，否则 `-0.1`
//! - 总奖励：`clamp(0.6k + 0.25e + 0.15m, -1, 1)`
//!
//! ## 难度调整
//! - 答对 `+0.5`（c > 0.8 时 `+0.7`，c < 0.4 时 `+0.3`）
//! - 答错 `-0.3`（c > 0.7 时 `-0.5`，过度自信）
//! - 再叠加 `reward × 0.2`，结果截断到 [1, 10] 并保留一位小数
//!
//! 超出范围的输入一律截断或取默认值，不报错：客户端数据噪声不应打断自适应循环。

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{MAX_DIFFICULTY, MIN_DIFFICULTY};

// ============================================================================
// 常量定义
// ============================================================================

/// 未提供信心值时的默认值
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

// ============================================================================
// 配置
// ============================================================================

/// 奖励权重与阈值，可注入以便测试使用固定配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    pub knowledge_weight: f64,
    pub efficiency_weight: f64,
    pub metacognition_weight: f64,
    /// 用时不小于该值（秒）时不计效率项
    pub efficiency_cutoff_secs: f64,
    /// 奖励对难度调整的影响系数
    pub reward_influence: f64,
    /// 答对时，信心高于该值视为校准良好；答错时，高于该值视为过度自信
    pub high_confidence: f64,
    /// 信心低于该值视为低信心
    pub low_confidence: f64,
    /// 答对且信心高于该值时加大升档幅度
    pub very_high_confidence: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            knowledge_weight: 0.6,
            efficiency_weight: 0.25,
            metacognition_weight: 0.15,
            efficiency_cutoff_secs: 60.0,
            reward_influence: 0.2,
            high_confidence: 0.7,
            low_confidence: 0.4,
            very_high_confidence: 0.8,
        }
    }
}

// ============================================================================
// 数据类型定义
// ============================================================================

/// 一次作答的信号
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerSignal {
    pub is_correct: bool,
    /// 0-1；缺省按 0.5 计，且校准结论为 unknown
    pub confidence: Option<f64>,
    pub time_spent_secs: f64,
    pub current_difficulty: f64,
    pub streak: u32,
}

/// 信心校准结论
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Calibration {
    Good,
    NeedsWork,
    Unknown,
}

/// 各分项奖励；`total` 为截断前的加权和
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardBreakdown {
    pub knowledge: f64,
    pub efficiency: f64,
    pub metacognition: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardOutcome {
    /// [-1, 1]
    pub reward: f64,
    pub breakdown: RewardBreakdown,
    pub previous_difficulty: f64,
    /// [1, 10]，一位小数
    pub new_difficulty: f64,
    pub calibration: Calibration,
}

// ============================================================================
// 引擎
// ============================================================================

/// 截断后的输入
#[derive(Debug, Clone, Copy)]
struct Sanitized {
    is_correct: bool,
    confidence: f64,
    confidence_known: bool,
    time_spent: f64,
    difficulty: f64,
    streak: u32,
}

#[derive(Debug, Clone, Default)]
pub struct DifficultyRewardEngine {
    config: RewardConfig,
}

impl DifficultyRewardEngine {
    pub fn new(config: RewardConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RewardConfig {
        &self.config
    }

    fn sanitize(signal: &AnswerSignal) -> Sanitized {
        let (confidence, confidence_known) = match signal.confidence {
            Some(c) if c.is_finite() => (c.clamp(0.0, 1.0), true),
            _ => (DEFAULT_CONFIDENCE, false),
        };
        let time_spent = if signal.time_spent_secs.is_finite() {
            signal.time_spent_secs.max(0.0)
        } else {
            0.0
        };
        let difficulty = if signal.current_difficulty.is_finite() {
            signal
                .current_difficulty
                .clamp(MIN_DIFFICULTY as f64, MAX_DIFFICULTY as f64)
        } else {
            MIN_DIFFICULTY as f64
        };

        Sanitized {
            is_correct: signal.is_correct,
            confidence,
            confidence_known,
            time_spent,
            difficulty,
            streak: signal.streak,
        }
    }

    fn is_calibrated(&self, is_correct: bool, confidence: f64) -> bool {
        (is_correct && confidence > self.config.high_confidence)
            || (!is_correct && confidence < self.config.low_confidence)
    }

    fn knowledge_term(&self, input: &Sanitized) -> f64 {
        if !input.is_correct {
            return -0.2;
        }
        let mut term = 0.5 + (input.difficulty / 10.0) * 0.5;
        if input.streak > 2 {
            term += (input.streak as f64 * 0.05).min(0.2);
        }
        term
    }

    fn efficiency_term(&self, input: &Sanitized) -> f64 {
        if !input.is_correct || input.time_spent >= self.config.efficiency_cutoff_secs {
            return 0.0;
        }
        let optimal_time = 15.0 + input.difficulty * 4.0;
        let ratio = input.time_spent / optimal_time;
        (0.3 * (1.0 - (1.0 - ratio).abs())).max(0.0)
    }

    fn metacognition_term(&self, input: &Sanitized) -> f64 {
        if self.is_calibrated(input.is_correct, input.confidence) {
            0.3
        } else {
            -0.1
        }
    }

    /// 计算奖励分项；返回值已截断到 [-1, 1]
    pub fn reward(&self, signal: &AnswerSignal) -> (f64, RewardBreakdown) {
        let input = Self::sanitize(signal);
        self.reward_for(&input)
    }

    fn reward_for(&self, input: &Sanitized) -> (f64, RewardBreakdown) {
        let knowledge = self.knowledge_term(input);
        let efficiency = self.efficiency_term(input);
        let metacognition = self.metacognition_term(input);
        let total = self.config.knowledge_weight * knowledge
            + self.config.efficiency_weight * efficiency
            + self.config.metacognition_weight * metacognition;

        (
            total.clamp(-1.0, 1.0),
            RewardBreakdown {
                knowledge,
                efficiency,
                metacognition,
                total,
            },
        )
    }

    fn difficulty_delta(&self, input: &Sanitized, reward: f64) -> f64 {
        let base = if input.is_correct {
            if input.confidence > self.config.very_high_confidence {
                0.7
            } else if input.confidence < self.config.low_confidence {
                0.3
            } else {
                0.5
            }
        } else if input.confidence > self.config.high_confidence {
            -0.5
        } else {
            -0.3
        };
        base + reward * self.config.reward_influence
    }

    /// 完整打分：奖励、分项、新难度与校准结论
    pub fn evaluate(&self, signal: &AnswerSignal) -> RewardOutcome {
        let input = Self::sanitize(signal);
        let (reward, breakdown) = self.reward_for(&input);

        let raw = (input.difficulty + self.difficulty_delta(&input, reward))
            .clamp(MIN_DIFFICULTY as f64, MAX_DIFFICULTY as f64);
        let new_difficulty = round_to_tenth(raw);

        let calibration = if !input.confidence_known {
            Calibration::Unknown
        } else if self.is_calibrated(input.is_correct, input.confidence) {
            Calibration::Good
        } else {
            Calibration::NeedsWork
        };

        debug!(
            "[DifficultyReward] correct={}, confidence={:.2}, time={:.1}s, reward={:.3}, difficulty {:.1} -> {:.1}",
            input.is_correct, input.confidence, input.time_spent, reward, input.difficulty, new_difficulty
        );

        RewardOutcome {
            reward,
            breakdown,
            previous_difficulty: input.difficulty,
            new_difficulty,
            calibration,
        }
    }
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

// ============================================================================
// 单元测试
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(
        is_correct: bool,
        confidence: Option<f64>,
        time: f64,
        difficulty: f64,
        streak: u32,
    ) -> AnswerSignal {
        AnswerSignal {
            is_correct,
            confidence,
            time_spent_secs: time,
            current_difficulty: difficulty,
            streak,
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_confident_fast_correct_answer() {
        let engine = DifficultyRewardEngine::default();
        let outcome = engine.evaluate(&signal(true, Some(0.9), 20.0, 5.0, 3));

        assert!(approx(outcome.breakdown.knowledge, 0.9));
        assert!(approx(outcome.breakdown.efficiency, 0.3 * (20.0 / 35.0)));
        assert!(approx(outcome.breakdown.metacognition, 0.3));
        assert!(approx(outcome.reward, 0.627857142857));
        assert_eq!(outcome.new_difficulty, 5.8);
        assert_eq!(outcome.calibration, Calibration::Good);
    }

    #[test]
    fn test_overconfident_wrong_answer() {
        let engine = DifficultyRewardEngine::default();
        let outcome = engine.evaluate(&signal(false, Some(0.9), 10.0, 5.0, 0));

        // 0.6 × -0.2 + 0 + 0.15 × -0.1 = -0.135
        assert!(approx(outcome.reward, -0.135));
        // 5 - 0.5 - 0.027 = 4.473
        assert_eq!(outcome.new_difficulty, 4.5);
        assert_eq!(outcome.calibration, Calibration::NeedsWork);
    }

    #[test]
    fn test_streak_bonus_caps_at_point_two() {
        let engine = DifficultyRewardEngine::default();
        let (_, two) = engine.reward(&signal(true, Some(0.5), 90.0, 4.0, 2));
        let (_, ten) = engine.reward(&signal(true, Some(0.5), 90.0, 4.0, 10));
        assert!(approx(two.knowledge, 0.7));
        assert!(approx(ten.knowledge, 0.9));
    }

    #[test]
    fn test_slow_answer_has_no_efficiency() {
        let engine = DifficultyRewardEngine::default();
        let (_, breakdown) = engine.reward(&signal(true, Some(0.9), 60.0, 5.0, 0));
        assert_eq!(breakdown.efficiency, 0.0);
    }

    #[test]
    fn test_noisy_inputs_are_clamped() {
        let engine = DifficultyRewardEngine::default();

        let outcome = engine.evaluate(&signal(true, Some(7.0), -12.0, 42.0, 0));
        assert_eq!(outcome.previous_difficulty, 10.0);
        assert_eq!(outcome.new_difficulty, 10.0);
        assert_eq!(outcome.calibration, Calibration::Good);

        let outcome = engine.evaluate(&signal(false, Some(f64::NAN), f64::NAN, f64::NAN, 0));
        assert_eq!(outcome.previous_difficulty, 1.0);
        assert_eq!(outcome.new_difficulty, 1.0);
        assert_eq!(outcome.calibration, Calibration::Unknown);
    }

    #[test]
    fn test_missing_confidence_defaults_to_half() {
        let engine = DifficultyRewardEngine::default();
        let missing = engine.evaluate(&signal(true, None, 30.0, 5.0, 0));
        let half = engine.evaluate(&signal(true, Some(0.5), 30.0, 5.0, 0));
        assert_eq!(missing.reward, half.reward);
        assert_eq!(missing.new_difficulty, half.new_difficulty);
        assert_eq!(missing.calibration, Calibration::Unknown);
        assert_eq!(half.calibration, Calibration::NeedsWork);
    }

    #[test]
    fn test_injected_config_changes_weights() {
        let engine = DifficultyRewardEngine::new(RewardConfig {
            knowledge_weight: 1.0,
            efficiency_weight: 0.0,
            metacognition_weight: 0.0,
            ..RewardConfig::default()
        });
        let (reward, _) = engine.reward(&signal(false, Some(0.2), 10.0, 5.0, 0));
        assert!(approx(reward, -0.2));
    }

    #[test]
    fn test_ranges_and_monotonicity_over_grid() {
        let engine = DifficultyRewardEngine::default();
        for d in 1..=10 {
            for c in [0.0, 0.2, 0.39, 0.4, 0.5, 0.7, 0.75, 0.8, 0.81, 1.0] {
                for t in [0.0, 5.0, 20.0, 59.0, 60.0, 300.0] {
                    for streak in [0, 3, 8] {
                        let right = engine.evaluate(&signal(true, Some(c), t, d as f64, streak));
                        let wrong = engine.evaluate(&signal(false, Some(c), t, d as f64, streak));
                        for o in [&right, &wrong] {
                            assert!((-1.0..=1.0).contains(&o.reward));
                            assert!((1.0..=10.0).contains(&o.new_difficulty));
                        }
                        assert!(right.new_difficulty >= wrong.new_difficulty);
                    }
                }
            }
        }
    }
}
