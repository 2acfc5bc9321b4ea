//! 出题 Prompt 模板
//!
//! 难度先四舍五入并截断到 1-10。数学题附带一道按难度分段随机生成的示例题，
//! 其余学科从分段主题列表中随机选一个主题。所有模板都要求模型按固定的行格式输出，
//! 这个格式就是与解析器之间的约定：
//!
//! ```text
//! Question: [The question]
//! A) [Option A]
//! B) [Option B]
//! C) [Option C]
//! D) [Option D]
//!
//! Correct Answer: [Letter]) [Value]
//! ```

use rand::seq::SliceRandom;
use rand::{Rng, RngCore};

use crate::models::normalize_difficulty;

const OUTPUT_FORMAT: &str = "FORMAT:
Question: [The question]
A) [Option A]
B) [Option B]
C) [Option C]
D) [Option D]

Correct Answer: [Letter]) [Value]";

/// 难度分段标签
pub fn band_label(difficulty: u8) -> &'static str {
    match difficulty {
        0..=3 => "Easy",
        4..=5 => "Medium",
        6..=7 => "Hard",
        _ => "Very Hard",
    }
}

/// 学科 → 四个难度分段（≤3, ≤5, ≤7, 其余）的主题与复杂度说明
struct SubjectTopics {
    subject: &'static str,
    display: &'static str,
    bands: [(&'static [&'static str], &'static str); 4],
    accuracy_note: &'static str,
}

const SUBJECT_TOPICS: &[SubjectTopics] = &[
    SubjectTopics {
        subject: "science",
        display: "science",
        bands: [
            (
                &["basic animals", "weather", "plants", "colors in nature", "day and night"],
                "Keep it simple with basic facts and observations.",
            ),
            (
                &["states of matter", "animal habitats", "food chains", "planets", "human body systems"],
                "Include some scientific terminology but keep explanations clear.",
            ),
            (
                &["chemical reactions", "ecosystems", "genetics basics", "physics forces", "cell biology"],
                "Use proper scientific terms and require deeper understanding.",
            ),
            (
                &["molecular biology", "quantum physics basics", "advanced chemistry", "complex ecosystems", "astrophysics"],
                "Advanced concepts requiring scientific reasoning and analysis.",
            ),
        ],
        accuracy_note: "Educational and scientifically accurate",
    },
    SubjectTopics {
        subject: "history",
        display: "history",
        bands: [
            (
                &["famous leaders", "basic dates", "countries and flags", "simple inventions"],
                "Focus on well-known facts and basic chronology.",
            ),
            (
                &["wars and battles", "ancient civilizations", "exploration", "cultural movements"],
                "Include causes, effects, and connections between events.",
            ),
            (
                &["political systems", "economic history", "social movements", "diplomatic relations"],
                "Require analysis of complex historical relationships and impacts.",
            ),
            (
                &["historiography", "comparative civilizations", "historical methodology", "complex causation"],
                "Advanced historical thinking and interpretation required.",
            ),
        ],
        accuracy_note: "Historically accurate",
    },
    SubjectTopics {
        subject: "english",
        display: "English",
        bands: [
            (
                &["basic vocabulary", "simple grammar", "spelling", "sentence structure"],
                "Use common words and straightforward concepts.",
            ),
            (
                &["synonyms/antonyms", "punctuation", "parts of speech", "reading comprehension"],
                "Include moderate vocabulary and grammar rules.",
            ),
            (
                &["advanced grammar", "literary devices", "complex vocabulary", "writing techniques"],
                "Require understanding of nuanced language concepts.",
            ),
            (
                &["literary analysis", "rhetoric", "advanced composition", "linguistic patterns"],
                "Advanced language arts requiring critical thinking and analysis.",
            ),
        ],
        accuracy_note: "Educationally appropriate",
    },
];

fn band_index(difficulty: u8) -> usize {
    match difficulty {
        0..=3 => 0,
        4..=5 => 1,
        6..=7 => 2,
        _ => 3,
    }
}

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    learner_level: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new("intermediate")
    }
}

impl PromptBuilder {
    pub fn new(learner_level: impl Into<String>) -> Self {
        Self {
            learner_level: learner_level.into(),
        }
    }

    pub fn build(&self, subject: &str, difficulty: f64, rng: &mut dyn RngCore) -> String {
        let level = normalize_difficulty(difficulty);
        let subject = subject.trim().to_lowercase();

        if subject == "math" {
            return self.math_prompt(level, rng);
        }
        match SUBJECT_TOPICS.iter().find(|s| s.subject == subject) {
            Some(topics) => self.subject_prompt(topics, level, rng),
            None => self.generic_prompt(&subject, level, rng),
        }
    }

    /// 按难度分段生成一道示例题：(主题, 示例题干, 示例答案)
    fn math_example(level: u8, rng: &mut dyn RngCore) -> (&'static str, String, String) {
        match level {
            0..=2 => {
                let a = rng.gen_range(2..=8);
                let b = rng.gen_range(2..=8);
                ("basic multiplication", format!("What is {a} × {b}?"), (a * b).to_string())
            }
            3..=4 => {
                let a: i64 = rng.gen_range(10..=99);
                let b: i64 = rng.gen_range(2..=10);
                if rng.gen_bool(0.5) {
                    ("two-digit multiplication", format!("What is {a} × {b}?"), (a * b).to_string())
                } else {
                    ("division", format!("What is {} ÷ {a}?", a * b), b.to_string())
                }
            }
            5..=6 => {
                let percent: i64 = [10, 20, 25, 50, 75].choose(rng).copied().unwrap_or(10);
                let base: i64 = rng.gen_range(1..=10) * 20;
                (
                    "percentage calculation",
                    format!("What is {percent}% of {base}?"),
                    (percent * base / 100).to_string(),
                )
            }
            7..=8 => {
                let a: i64 = rng.gen_range(2..=6);
                let x: i64 = rng.gen_range(1..=9);
                let b: i64 = rng.gen_range(1..=9);
                (
                    "linear algebra",
                    format!("Solve for x: {a}x + {b} = {}", a * x + b),
                    format!("x = {x}"),
                )
            }
            _ => {
                let topic = ["quadratic", "trigonometry", "logarithms"]
                    .choose(rng)
                    .copied()
                    .unwrap_or("quadratic");
                (
                    topic,
                    format!("an advanced {topic} problem for advanced students"),
                    "(worked out by you)".to_string(),
                )
            }
        }
    }

    /// 示例只放在说明文字里，不用 `Key:` 行，避免模型照抄进题干
    fn math_prompt(&self, level: u8, rng: &mut dyn RngCore) -> String {
        let (topic, example, answer) = Self::math_example(level, rng);
        let band = band_label(level);
        format!(
            "Create a math question about {topic} at difficulty level {level}/10 ({band}).\n\
             For reference, a similar question is \"{example}\" with answer {answer}. Do not reuse it.\n\n\
             REQUIREMENTS:\n\
             - Generate exactly this difficulty level: {level}/10\n\
             - Provide exactly 4 answer choices labeled A, B, C, D\n\
             - Make one answer clearly correct\n\
             - Create 3 plausible but incorrect distractors\n\
             - Do not put explanations on the answer choice lines\n\
             - Output only the lines shown in the format below\n\n\
             {OUTPUT_FORMAT}\n\n\
             Generate this math question now:"
        )
    }

    fn subject_prompt(&self, topics: &SubjectTopics, level: u8, rng: &mut dyn RngCore) -> String {
        let (candidates, complexity) = topics.bands[band_index(level)];
        let topic = candidates.choose(rng).copied().unwrap_or("general knowledge");
        let article = if topics.display.starts_with(['a', 'e', 'i', 'o', 'u', 'E']) {
            "an"
        } else {
            "a"
        };
        format!(
            "Create {article} {display} question about {topic} for difficulty level {level}/10.\n\n\
             DIFFICULTY REQUIREMENTS:\n\
             - Level: {level}/10 ({band})\n\
             - Topic: {topic}\n\
             - {complexity}\n\
             - Age level: {learner}\n\n\
             FORMAT REQUIREMENTS:\n\
             - Exactly 4 answer choices labeled A, B, C, D\n\
             - One clearly correct answer\n\
             - {accuracy}\n\n\
             {OUTPUT_FORMAT}\n\n\
             Create this {display} question now:",
            display = topics.display,
            band = band_label(level),
            learner = self.learner_level,
            accuracy = topics.accuracy_note,
        )
    }

    fn generic_prompt(&self, subject: &str, level: u8, rng: &mut dyn RngCore) -> String {
        let seed: u32 = rng.gen_range(0..1000);
        format!(
            "Create a {subject} question for difficulty level {level}/10.\n\n\
             DIFFICULTY REQUIREMENTS:\n\
             - Exact difficulty: {level}/10\n\
             - Make it appropriately challenging for this level\n\
             - User level: {learner}\n\
             - Question ID: #{seed}\n\n\
             CONTENT REQUIREMENTS:\n\
             - Subject: {subject}\n\
             - Exactly 4 answer choices (A, B, C, D)\n\
             - One clearly correct answer\n\
             - Educational and engaging\n\n\
             {OUTPUT_FORMAT}\n\n\
             Create question #{seed} now:",
            learner = self.learner_level,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_difficulty_is_clamped_and_rounded() {
        let builder = PromptBuilder::default();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(builder
            .build("science", 42.0, &mut rng)
            .contains("Level: 10/10 (Very Hard)"));
        assert!(builder
            .build("history", 3.4, &mut rng)
            .contains("Level: 3/10 (Easy)"));
        assert!(builder
            .build("math", -5.0, &mut rng)
            .contains("Generate exactly this difficulty level: 1/10"));
    }

    #[test]
    fn test_every_prompt_demands_the_line_format() {
        let builder = PromptBuilder::new("beginner");
        let mut rng = StdRng::seed_from_u64(2);
        for subject in ["math", "science", "history", "english", "geography"] {
            for difficulty in 1..=10 {
                let prompt = builder.build(subject, difficulty as f64, &mut rng);
                assert!(prompt.contains("Correct Answer: [Letter]) [Value]"), "{}", subject);
                assert!(prompt.contains("A) [Option A]"));
            }
        }
    }

    #[test]
    fn test_subject_specific_wording() {
        let builder = PromptBuilder::new("beginner");
        let mut rng = StdRng::seed_from_u64(3);
        let english = builder.build("English", 6.0, &mut rng);
        assert!(english.starts_with("Create an English question about"));
        assert!(english.contains("Age level: beginner"));

        let generic = builder.build("geography", 5.0, &mut rng);
        assert!(generic.starts_with("Create a geography question for difficulty level 5/10."));

        let math = builder.build("math", 2.0, &mut rng);
        assert!(math.starts_with("Create a math question about basic multiplication"));
    }

    #[test]
    fn test_math_example_has_no_key_value_lines() {
        let builder = PromptBuilder::default();
        let mut rng = StdRng::seed_from_u64(4);
        for difficulty in 1..=10 {
            let prompt = builder.build("math", difficulty as f64, &mut rng);
            let metadata_lines = prompt
                .lines()
                .filter(|line| {
                    let line = line.trim_start();
                    line.starts_with("Topic:")
                        || line.starts_with("Difficulty:")
                        || line.starts_with("Answer:")
                })
                .count();
            assert_eq!(metadata_lines, 0, "difficulty {}: {}", difficulty, prompt);
            assert_eq!(prompt.matches("Question:").count(), 1);
        }
    }
}
