//! 兜底出题
//!
//! 任何解析、校验、复核失败都会落到这里；本模块必须总能产出一道答案正确的题。
//!
//! 数学题按难度分档，每档一个生成函数，通过 `TIER_GENERATORS` 分派：
//!
//! | 档位 | 难度 | 题型 |
//! |------|------|------|
//! | Basic | 1-2 | 乘法，操作数 2-7 |
//! | Extended | 3-4 | 乘法，操作数 2-9 |
//! | Percent | 5-6 | 固定百分比 × 固定基数 |
//! | Algebra | 7-10 | `a·x + b = c`，整数解 |
//!
//! 一次方程抽样后重新校验整数性，不满足则改用 Percent 档。
//! 非数学学科从内置题库中均匀抽取。

use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use tracing::debug;

use super::math_forms::MathForm;
use super::types::QuestionCandidate;
use crate::models::{is_math_subject, QuestionSource, OPTION_COUNT};

// ============================================================================
// 难度档位
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MathTier {
    Basic,
    Extended,
    Percent,
    Algebra,
}

impl MathTier {
    pub fn from_difficulty(difficulty: u8) -> Self {
        match difficulty {
            0..=2 => MathTier::Basic,
            3..=4 => MathTier::Extended,
            5..=6 => MathTier::Percent,
            _ => MathTier::Algebra,
        }
    }

    /// 该档生成失败时改用的档位
    pub fn retry_tier(self) -> Option<MathTier> {
        match self {
            MathTier::Algebra => Some(MathTier::Percent),
            _ => None,
        }
    }
}

type TierGenerator = fn(&mut dyn RngCore) -> Option<MathForm>;

/// 档位 → 生成函数
pub const TIER_GENERATORS: [(MathTier, TierGenerator); 4] = [
    (MathTier::Basic, generate_basic),
    (MathTier::Extended, generate_extended),
    (MathTier::Percent, generate_percent),
    (MathTier::Algebra, generate_algebra),
];

pub const PERCENTAGES: [i64; 5] = [10, 20, 25, 50, 75];
pub const PERCENT_BASES: [i64; 6] = [20, 40, 60, 80, 100, 200];
pub const LINEAR_COEFFICIENTS: [i64; 4] = [2, 3, 4, 5];
pub const LINEAR_CONSTANTS: [i64; 6] = [1, 2, 3, 4, 5, 6];
pub const LINEAR_RESULTS: [i64; 8] = [12, 15, 18, 20, 24, 27, 30, 36];

fn generate_basic(rng: &mut dyn RngCore) -> Option<MathForm> {
    Some(MathForm::Product {
        a: rng.gen_range(2..=7),
        b: rng.gen_range(2..=7),
    })
}

fn generate_extended(rng: &mut dyn RngCore) -> Option<MathForm> {
    Some(MathForm::Product {
        a: rng.gen_range(2..=9),
        b: rng.gen_range(2..=9),
    })
}

fn generate_percent(rng: &mut dyn RngCore) -> Option<MathForm> {
    let percent = *PERCENTAGES.choose(rng)?;
    let base = *PERCENT_BASES.choose(rng)?;
    Some(MathForm::PercentOf { percent, base })
}

fn generate_algebra(rng: &mut dyn RngCore) -> Option<MathForm> {
    let form = MathForm::Linear {
        a: *LINEAR_COEFFICIENTS.choose(rng)?,
        b: *LINEAR_CONSTANTS.choose(rng)?,
        result: *LINEAR_RESULTS.choose(rng)?,
    };
    // 整数且为正的解才接受
    match form.evaluate() {
        Some(x) if x > 0 => Some(form),
        _ => None,
    }
}

fn generator_for(tier: MathTier) -> TierGenerator {
    TIER_GENERATORS
        .iter()
        .find(|(t, _)| *t == tier)
        .map(|(_, g)| *g)
        .unwrap_or(generate_basic)
}

// ============================================================================
// 干扰项
// ============================================================================

/// 偏移量：`max(2, round(correct × 0.1))`
pub fn variance_for(correct: i64) -> i64 {
    ((correct as f64 * 0.1).round() as i64).max(2)
}

fn push(values: &mut Vec<i64>, v: i64) {
    if v > 0 && !values.contains(&v) && values.len() < OPTION_COUNT {
        values.push(v);
    }
}

/// 生成恰好 4 个互不相同的正整数选项（含正确值），已打乱
pub fn numeric_options(correct: i64, rng: &mut dyn RngCore) -> Vec<i64> {
    let variance = variance_for(correct);
    let mut values = vec![correct];

    for proposal in [
        correct + variance,
        correct - variance,
        (correct as f64 * 1.2).round() as i64,
    ] {
        push(&mut values, proposal);
    }

    let spread = variance * 3;
    for _ in 0..32 {
        if values.len() == OPTION_COUNT {
            break;
        }
        let offset = rng.gen_range(-spread..=spread);
        if offset != 0 {
            push(&mut values, correct + offset);
        }
    }

    // 随机补齐失败时的确定性扫描
    let mut step = 1;
    while values.len() < OPTION_COUNT {
        push(&mut values, correct + step);
        step += 1;
    }

    values.shuffle(rng);
    values
}

// ============================================================================
// 非数学题库
// ============================================================================

struct BankEntry {
    text: &'static str,
    options: [&'static str; 4],
    correct: &'static str,
}

const SCIENCE_BANK: &[BankEntry] = &[
    BankEntry {
        text: "What is the chemical symbol for water?",
        options: ["H2O", "CO2", "NaCl", "O2"],
        correct: "H2O",
    },
    BankEntry {
        text: "How many planets are in our solar system?",
        options: ["8", "9", "7", "10"],
        correct: "8",
    },
    BankEntry {
        text: "What gas do plants need for photosynthesis?",
        options: ["Carbon dioxide", "Oxygen", "Nitrogen", "Hydrogen"],
        correct: "Carbon dioxide",
    },
];

const HISTORY_BANK: &[BankEntry] = &[
    BankEntry {
        text: "In which year did World War II end?",
        options: ["1945", "1944", "1946", "1943"],
        correct: "1945",
    },
    BankEntry {
        text: "Who was the first U.S. President?",
        options: [
            "George Washington",
            "John Adams",
            "Thomas Jefferson",
            "Benjamin Franklin",
        ],
        correct: "George Washington",
    },
    BankEntry {
        text: "In which year did the Titanic sink?",
        options: ["1912", "1911", "1913", "1910"],
        correct: "1912",
    },
];

const ENGLISH_BANK: &[BankEntry] = &[
    BankEntry {
        text: "What is a synonym for 'happy'?",
        options: ["Joyful", "Sad", "Angry", "Tired"],
        correct: "Joyful",
    },
    BankEntry {
        text: "Which word is a noun?",
        options: ["Cat", "Run", "Quickly", "Beautiful"],
        correct: "Cat",
    },
    BankEntry {
        text: "What is the opposite of 'hot'?",
        options: ["Cold", "Warm", "Cool", "Freezing"],
        correct: "Cold",
    },
];

fn bank_for(subject: &str) -> &'static [BankEntry] {
    match subject {
        "history" => HISTORY_BANK,
        "english" => ENGLISH_BANK,
        _ => SCIENCE_BANK,
    }
}

// ============================================================================
// 生成器
// ============================================================================

#[derive(Debug, Default)]
pub struct FallbackGenerator;

impl FallbackGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self, subject: &str, difficulty: u8, rng: &mut dyn RngCore) -> QuestionCandidate {
        let candidate = if is_math_subject(subject) {
            self.generate_math(subject, difficulty, rng)
        } else {
            self.generate_from_bank(subject, difficulty, rng)
        };
        debug!(
            "[FallbackGenerator] subject={}, difficulty={}, question={}",
            subject, difficulty, candidate.text
        );
        candidate
    }

    /// 按档位出一道数学题（档位可能因整数性校验失败而降级）
    pub fn math_form(&self, tier: MathTier, rng: &mut dyn RngCore) -> MathForm {
        let mut current = Some(tier);
        while let Some(t) = current {
            if let Some(form) = generator_for(t)(rng) {
                if form.evaluate().is_some() {
                    return form;
                }
            }
            current = t.retry_tier();
        }
        // 乘法档总能成功
        let a = rng.gen_range(2..=7);
        let b = rng.gen_range(2..=7);
        MathForm::Product { a, b }
    }

    fn generate_math(&self, subject: &str, difficulty: u8, rng: &mut dyn RngCore) -> QuestionCandidate {
        let form = self.math_form(MathTier::from_difficulty(difficulty), rng);
        let correct = form.evaluate().unwrap_or_default();
        let options = numeric_options(correct, rng)
            .into_iter()
            .map(|v| v.to_string())
            .collect();

        QuestionCandidate {
            text: form.render(),
            options,
            correct_answer: correct.to_string(),
            difficulty,
            subject: subject.to_string(),
            source: QuestionSource::Fallback,
        }
    }

    fn generate_from_bank(
        &self,
        subject: &str,
        difficulty: u8,
        rng: &mut dyn RngCore,
    ) -> QuestionCandidate {
        let bank = bank_for(subject);
        let entry = &bank[rng.gen_range(0..bank.len())];
        let mut options: Vec<String> = entry.options.iter().map(|o| o.to_string()).collect();
        options.shuffle(rng);

        QuestionCandidate {
            text: entry.text.to_string(),
            options,
            correct_answer: entry.correct.to_string(),
            difficulty,
            subject: subject.to_string(),
            source: QuestionSource::Fallback,
        }
    }
}
