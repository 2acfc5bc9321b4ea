//! 模型输出解析
//!
//! 把补全接口返回的自由文本解析为候选选择题。约定的行格式：
//!
//! ```text
//! Question: What is 3 × 4?
//! A) 12
//! B) 10
//! C) 14
//! D) 15
//! Correct Answer: A) 12
//! ```
//!
//! 容忍 Markdown 强调符、`\(` 之类的转义括号、`A.` / `A:` / `(A)` 等选项写法。
//! 选项超过 4 个时只保留前 4 个（有损策略）；不足 4 个或答案字母无法对应到选项时解析失败。

use regex::Regex;
use std::sync::LazyLock;

use super::types::{ExtractionFailure, QuestionCandidate};
use crate::models::{QuestionSource, OPTION_COUNT};

static RE_POW_DOUBLE_STAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z0-9)])\*\*(\d+)").expect("static regex"));
static RE_POW_BRACED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\^\{\s*(\d+)\s*\}").expect("static regex"));
static RE_POW_CARET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\^(\d+)").expect("static regex"));
static RE_INLINE_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t\u{00A0}]+").expect("static regex"));

static RE_STEM_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(?:question|q)(?:\s*\d+)?\s*[:.)]\s*(.+)$").expect("static regex"));
static RE_CHOICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:\(([A-D])\)|([A-D])[).:])\s*(.*)$").expect("static regex"));
static RE_ANSWER_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:the\s+)?(?:correct\s+answer|answer)(?:\s+is)?\s*[:\-]?\s*[\(\[]?([A-D])\b")
        .expect("static regex")
});
static RE_ANSWER_LOOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)correct[^\n]*?\b([A-D])\)").expect("static regex"));
static RE_ANSWER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(?:the\s+)?(?:correct\s+answer|answer)\b").expect("static regex"));
/// 模型照抄的 `Topic:`、`Difficulty:` 一类元数据行，不属于题干
static RE_METADATA_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:topic|subject|difficulty|level|answer|explanation|hint)\s*:").expect("static regex")
});

/// 解释性文字的开头，出现在选项位置时丢弃
const EXPLANATION_PREFIXES: &[&str] = &[
    "explanation",
    "because",
    "note",
    "reason",
    "this is",
    "the correct",
];

fn superscript(digits: &str) -> String {
    digits
        .chars()
        .map(|c| match c {
            '0' => '⁰',
            '1' => '¹',
            '2' => '²',
            '3' => '³',
            '4' => '⁴',
            '5' => '⁵',
            '6' => '⁶',
            '7' => '⁷',
            '8' => '⁸',
            '9' => '⁹',
            other => other,
        })
        .collect()
}

/// 归一化：指数转上标 → 去强调符 → 转义括号还原 → 行内空白折叠
///
/// 指数必须先于 `**` 的剥离处理，否则 `x**2` 会退化成 `x2`。
pub fn normalize(raw: &str) -> String {
    let text = raw.replace("\r\n", "\n");
    let text = RE_POW_DOUBLE_STAR.replace_all(&text, |caps: &regex::Captures| {
        format!("{}{}", &caps[1], superscript(&caps[2]))
    });
    let text = RE_POW_BRACED.replace_all(&text, |caps: &regex::Captures| superscript(&caps[1]));
    let text = RE_POW_CARET.replace_all(&text, |caps: &regex::Captures| superscript(&caps[1]));

    let text = text
        .replace("**", "")
        .replace("__", "")
        .replace('`', "")
        .replace("\\(", "(")
        .replace("\\)", ")")
        .replace("\\[", "[")
        .replace("\\]", "]");

    text.lines()
        .map(|line| RE_INLINE_SPACE.replace_all(line, " ").trim().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

fn clean_choice(body: &str) -> String {
    body.trim()
        .trim_matches(|c: char| c == '*' || c == '_' || c.is_whitespace())
        .to_string()
}

fn reads_as_explanation(body: &str) -> bool {
    let lower = body.to_lowercase();
    EXPLANATION_PREFIXES.iter().any(|p| lower.starts_with(p))
}

#[derive(Debug)]
struct Choice {
    letter: char,
    text: String,
}

#[derive(Debug, Default)]
pub struct ContentExtractor;

impl ContentExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(
        &self,
        raw: &str,
        subject: &str,
        difficulty: u8,
    ) -> Result<QuestionCandidate, ExtractionFailure> {
        let text = normalize(raw);
        let lines: Vec<&str> = text.lines().filter(|l| !l.is_empty()).collect();
        if lines.is_empty() {
            return Err(ExtractionFailure::EmptyInput);
        }

        let first_choice = lines.iter().position(|l| RE_CHOICE.is_match(l));
        let stem = Self::extract_stem(&lines, first_choice).ok_or(ExtractionFailure::MissingStem)?;

        let mut choices = match first_choice {
            Some(start) => Self::extract_choices(&lines[start..]),
            None => Vec::new(),
        };
        if choices.len() < OPTION_COUNT {
            return Err(ExtractionFailure::TooFewChoices {
                found: choices.len(),
            });
        }
        choices.truncate(OPTION_COUNT);

        let letter = Self::extract_letter(&lines, &text).ok_or(ExtractionFailure::MissingAnswer)?;
        let correct_answer = choices
            .iter()
            .find(|c| c.letter == letter)
            .map(|c| c.text.clone())
            .ok_or(ExtractionFailure::UnresolvedLetter { letter })?;

        Ok(QuestionCandidate {
            text: stem,
            options: choices.into_iter().map(|c| c.text).collect(),
            correct_answer,
            difficulty,
            subject: subject.to_string(),
            source: QuestionSource::Ai,
        })
    }

    /// 优先取 `Question:` 标签；否则取第一个选项行之前的文字
    fn extract_stem(lines: &[&str], first_choice: Option<usize>) -> Option<String> {
        let end = first_choice.unwrap_or(lines.len());
        let before = &lines[..end];

        let stem = match before.iter().position(|l| RE_STEM_LABEL.is_match(l)) {
            Some(idx) => {
                let head = RE_STEM_LABEL
                    .captures(before[idx])
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                // 续行遇到元数据行即截止
                std::iter::once(head)
                    .chain(
                        before[idx + 1..]
                            .iter()
                            .take_while(|l| !RE_METADATA_LINE.is_match(l))
                            .map(|l| l.to_string()),
                    )
                    .collect::<Vec<_>>()
                    .join(" ")
            }
            None => {
                // 没有标签且也没有选项时，整段文字都不是可信题干
                first_choice?;
                before
                    .iter()
                    .filter(|l| !RE_METADATA_LINE.is_match(l))
                    .copied()
                    .collect::<Vec<_>>()
                    .join(" ")
            }
        };

        let stem = stem.trim().to_string();
        if stem.is_empty() {
            None
        } else {
            Some(stem)
        }
    }

    fn extract_choices(lines: &[&str]) -> Vec<Choice> {
        let mut choices = Vec::new();
        for line in lines {
            if RE_ANSWER_LINE.is_match(line) {
                break;
            }
            let Some(caps) = RE_CHOICE.captures(line) else {
                continue;
            };
            let letter = caps
                .get(1)
                .or_else(|| caps.get(2))
                .and_then(|m| m.as_str().chars().next());
            let Some(letter) = letter else {
                continue;
            };
            let body = clean_choice(caps.get(3).map(|m| m.as_str()).unwrap_or(""));
            if body.is_empty() || reads_as_explanation(&body) {
                continue;
            }
            choices.push(Choice {
                letter,
                text: body,
            });
        }
        choices
    }

    fn extract_letter(lines: &[&str], text: &str) -> Option<char> {
        let strict = lines.iter().find_map(|line| {
            RE_ANSWER_LABEL
                .captures(line)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().chars().next())
        });
        strict
            .or_else(|| {
                RE_ANSWER_LOOSE
                    .captures(text)
                    .and_then(|c| c.get(1))
                    .and_then(|m| m.as_str().chars().next())
            })
            .map(|c| c.to_ascii_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(raw: &str) -> Result<QuestionCandidate, ExtractionFailure> {
        ContentExtractor::new().extract(raw, "math", 2)
    }

    #[test]
    fn test_extracts_labelled_question() {
        let c = extract("Question: What is 3 × 4?\nA) 12\nB) 10\nC) 14\nD) 15\nCorrect Answer: A) 12")
            .unwrap();
        assert_eq!(c.text, "What is 3 × 4?");
        assert_eq!(c.options, vec!["12", "10", "14", "15"]);
        assert_eq!(c.correct_answer, "12");
        assert_eq!(c.source, QuestionSource::Ai);
        assert_eq!(c.difficulty, 2);
    }

    #[test]
    fn test_echoed_metadata_lines_end_the_stem() {
        let raw = "Question: Solve for x: 3x + 4 = 19\nTopic: Linear algebra\nDifficulty: Hard (7/10)\n\
                   A) x = 5\nB) x = 4\nC) x = 6\nD) x = 3\nCorrect Answer: A) x = 5";
        let c = extract(raw).unwrap();
        assert_eq!(c.text, "Solve for x: 3x + 4 = 19");
        assert_eq!(c.correct_answer, "x = 5");

        let bold = "**Question:** What is 6 × 7?\n**Topic:** Basic multiplication\n\
                    A) 42\nB) 36\nC) 48\nD) 40\nCorrect Answer: A) 42";
        assert_eq!(extract(bold).unwrap().text, "What is 6 × 7?");

        // 续行本身不是元数据时照常拼接
        let wrapped = "Question: A train travels 60 km\nin 1.5 hours. What is its speed?\n\
                       A) 40 km/h\nB) 45 km/h\nC) 50 km/h\nD) 90 km/h\nAnswer: A";
        assert_eq!(
            extract(wrapped).unwrap().text,
            "A train travels 60 km in 1.5 hours. What is its speed?"
        );
    }

    #[test]
    fn test_tolerates_markdown_emphasis() {
        let raw = "**Question:** What is 7 × 8?\n\n**A)** 54\n**B)** 56\n**C)** 58\n**D)** 52\n\n**Correct Answer: B) 56**";
        let c = extract(raw).unwrap();
        assert_eq!(c.text, "What is 7 × 8?");
        assert_eq!(c.correct_answer, "56");
    }

    #[test]
    fn test_alternate_choice_markers() {
        let raw = "Which gas do plants absorb?\n(A) Oxygen\nB. Carbon dioxide\nC: Nitrogen\nD) Helium\nAnswer: B";
        let c = ContentExtractor::new().extract(raw, "science", 3).unwrap();
        assert_eq!(c.text, "Which gas do plants absorb?");
        assert_eq!(c.correct_answer, "Carbon dioxide");
    }

    #[test]
    fn test_truncates_extra_choices() {
        let raw = "Q: Pick one letter please\nA) a1\nB) b1\nC) c1\nD) d1\nA) a2\nAnswer: C";
        let c = extract(raw).unwrap();
        assert_eq!(c.options, vec!["a1", "b1", "c1", "d1"]);
        assert_eq!(c.correct_answer, "c1");
    }

    #[test]
    fn test_too_few_choices_fails() {
        let raw = "Question: What is 2 + 2?\nA) 4\nB) 5\nC) 6\nCorrect Answer: A) 4";
        assert_eq!(
            extract(raw),
            Err(ExtractionFailure::TooFewChoices { found: 3 })
        );
    }

    #[test]
    fn test_missing_or_unresolved_letter_fails() {
        let raw = "Question: What is 2 + 2?\nA) 4\nB) 5\nC) 6\nD) 7";
        assert_eq!(extract(raw), Err(ExtractionFailure::MissingAnswer));

        let raw = "Question: What is 2 + 2?\nA) 4\nB) 5\nC) 6\nA) 7\nCorrect Answer: D";
        assert_eq!(
            extract(raw),
            Err(ExtractionFailure::UnresolvedLetter { letter: 'D' })
        );
    }

    #[test]
    fn test_loose_answer_pattern() {
        let raw = "Question: What is 6 × 7?\nA) 40\nB) 42\nC) 44\nD) 38\nThe correct one is B) 42.";
        let c = extract(raw).unwrap();
        assert_eq!(c.correct_answer, "42");
    }

    #[test]
    fn test_explanation_lines_are_skipped() {
        let raw = "Question: What is 5 + 5?\nA) 10\nB) Because ten is the sum\nB) 11\nC) 9\nD) 12\nAnswer: A";
        let c = extract(raw).unwrap();
        assert_eq!(c.options, vec!["10", "11", "9", "12"]);
    }

    #[test]
    fn test_normalize_exponents_and_escapes() {
        assert_eq!(normalize("Solve \\(x**2 = 9\\)"), "Solve (x² = 9)");
        assert_eq!(normalize("x^2 + y^{3}"), "x² + y³");
        assert_eq!(normalize("  a   b\t\tc  \nd"), "a b c\nd");
        assert_eq!(normalize("`code` __bold__"), "code bold");
    }

    #[test]
    fn test_empty_and_stemless_input() {
        assert_eq!(extract("   \n  "), Err(ExtractionFailure::EmptyInput));
        assert_eq!(
            extract("A) 1\nB) 2\nC) 3\nD) 4\nAnswer: A"),
            Err(ExtractionFailure::MissingStem)
        );
    }
}
