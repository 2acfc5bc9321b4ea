//! 题目 → 知识点主题 的关键词归类
//!
//! 三步解析，结果只取决于输入与目录快照：
//! 1. 按学科的有序关键词规则表，取第一条命中规则的 slug；都不命中时按难度分段取默认 slug
//! 2. 目录中没有该 slug 时，用同一组关键词对同学科主题的 slug / 名称做大小写无关的子串匹配，
//!    按难度接近程度排序（难度提示与目录都是 0-1 刻度）
//! 3. 仍无结果时，用启发式 slug 合成一个不落库的临时主题，保证掌握度追踪总有可用的 id
//!
//! 规则顺序就是冲突时的裁决顺序，不要调整。

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::models::{LevelScale, Topic};

/// 合成主题的 id 前缀
pub const EPHEMERAL_PREFIX: &str = "ephemeral-";

/// 命中后映射到的 slug
#[derive(Debug, Clone, Copy)]
enum SlugTarget {
    Fixed(&'static str),
    /// 难度（0-1）高于阈值取 `above`，否则取 `below`
    Banded {
        threshold: f64,
        below: &'static str,
        above: &'static str,
    },
}

impl SlugTarget {
    fn pick(&self, difficulty: f64) -> &'static str {
        match *self {
            SlugTarget::Fixed(slug) => slug,
            SlugTarget::Banded {
                threshold,
                below,
                above,
            } => {
                if difficulty > threshold {
                    above
                } else {
                    below
                }
            }
        }
    }
}

#[derive(Debug)]
struct KeywordRule {
    subject: &'static str,
    keywords: &'static [&'static str],
    /// 同时出现这些词时本规则不命中（让后面更具体的规则接手）
    excludes: &'static [&'static str],
    target: SlugTarget,
}

const fn rule(
    subject: &'static str,
    keywords: &'static [&'static str],
    target: SlugTarget,
) -> KeywordRule {
    KeywordRule {
        subject,
        keywords,
        excludes: &[],
        target,
    }
}

const RULES: &[KeywordRule] = &[
    // math
    rule(
        "math",
        &["×", "*", "multiply", "times"],
        SlugTarget::Fixed("math-basic-arithmetic"),
    ),
    rule(
        "math",
        &["÷", "divide"],
        SlugTarget::Fixed("math-basic-arithmetic"),
    ),
    rule("math", &["%", "percent"], SlugTarget::Fixed("math-percentages")),
    rule("math", &["fraction", "/"], SlugTarget::Fixed("math-fractions")),
    rule("math", &["decimal"], SlugTarget::Fixed("math-decimals")),
    rule(
        "math",
        &["x =", "solve", "equation"],
        SlugTarget::Banded {
            threshold: 0.6,
            below: "math-linear-equations",
            above: "math-quadratic-equations",
        },
    ),
    rule(
        "math",
        &["area", "perimeter", "triangle"],
        SlugTarget::Fixed("math-basic-geometry"),
    ),
    rule("math", &["sin", "cos", "tan"], SlugTarget::Fixed("math-trigonometry")),
    // science
    rule(
        "science",
        &["atom", "element", "periodic"],
        SlugTarget::Fixed("science-atoms-elements"),
    ),
    rule(
        "science",
        &["bond", "ionic", "covalent"],
        SlugTarget::Fixed("science-chemical-bonds"),
    ),
    rule(
        "science",
        &["reaction", "equation", "balance"],
        SlugTarget::Fixed("science-chemical-reactions"),
    ),
    rule(
        "science",
        &["cell", "mitosis", "membrane"],
        SlugTarget::Fixed("science-cell-structure"),
    ),
    rule(
        "science",
        &["photosynthesis", "chlorophyll"],
        SlugTarget::Fixed("science-photosynthesis"),
    ),
    rule(
        "science",
        &["force", "motion", "newton"],
        SlugTarget::Fixed("science-forces-motion"),
    ),
    rule(
        "science",
        &["energy", "kinetic", "potential"],
        SlugTarget::Fixed("science-energy"),
    ),
    // history
    rule(
        "history",
        &["ancient", "egypt", "mesopotamia"],
        SlugTarget::Fixed("history-ancient-civilizations"),
    ),
    rule(
        "history",
        &["rome", "greece", "classical"],
        SlugTarget::Fixed("history-classical-antiquity"),
    ),
    rule(
        "history",
        &["medieval", "middle age"],
        SlugTarget::Fixed("history-medieval-period"),
    ),
    rule(
        "history",
        &["renaissance", "leonardo"],
        SlugTarget::Fixed("history-renaissance"),
    ),
    // 有意偏离“首条命中”：提到二战的题目跳过本条，交给下一条规则
    KeywordRule {
        subject: "history",
        keywords: &["world war", "wwi", "ww1"],
        excludes: &["world war ii", "world war 2", "wwii", "ww2"],
        target: SlugTarget::Fixed("history-world-war-1"),
    },
    rule(
        "history",
        &["world war", "wwii", "ww2"],
        SlugTarget::Fixed("history-world-war-2"),
    ),
    rule(
        "history",
        &["cold war", "soviet"],
        SlugTarget::Fixed("history-cold-war"),
    ),
    // english
    rule(
        "english",
        &["noun", "verb", "adjective"],
        SlugTarget::Fixed("english-parts-speech"),
    ),
    rule(
        "english",
        &["sentence", "subject", "predicate"],
        SlugTarget::Fixed("english-sentence-structure"),
    ),
    rule(
        "english",
        &["comma", "period", "punctuat"],
        SlugTarget::Fixed("english-punctuation"),
    ),
    rule(
        "english",
        &["synonym", "antonym", "meaning"],
        SlugTarget::Fixed("english-vocabulary-building"),
    ),
    rule(
        "english",
        &["metaphor", "simile", "symbol"],
        SlugTarget::Fixed("english-literary-devices"),
    ),
    rule(
        "english",
        &["essay", "paragraph", "thesis"],
        SlugTarget::Fixed("english-essay-writing"),
    ),
];

/// 未命中任何规则时按难度分段的默认 slug：(阈值, slug)，取第一个 `difficulty < 阈值` 的
const DEFAULT_BANDS: &[(&str, &[(f64, &str)])] = &[
    (
        "math",
        &[
            (0.3, "math-basic-arithmetic"),
            (0.6, "math-basic-algebra"),
            (f64::INFINITY, "math-quadratic-equations"),
        ],
    ),
    (
        "science",
        &[
            (0.4, "science-atoms-elements"),
            (0.6, "science-chemical-reactions"),
            (f64::INFINITY, "science-genetics-basics"),
        ],
    ),
    (
        "history",
        &[
            (0.4, "history-ancient-civilizations"),
            (0.7, "history-medieval-period"),
            (f64::INFINITY, "history-cold-war"),
        ],
    ),
    (
        "english",
        &[
            (0.4, "english-parts-speech"),
            (0.7, "english-writing-basics"),
            (f64::INFINITY, "english-literature-analysis"),
        ],
    ),
];

/// 解析结果来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicOrigin {
    /// 启发式 slug 在目录中存在
    ExactSlug,
    /// 关键词子串匹配到目录主题
    KeywordMatch,
    /// 合成的临时主题（不落库）
    Synthesized,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTopic {
    pub topic: Topic,
    pub origin: TopicOrigin,
}

impl ResolvedTopic {
    pub fn is_ephemeral(&self) -> bool {
        self.origin == TopicOrigin::Synthesized
    }
}

/// 启发式分类的中间结果
#[derive(Debug, Clone, PartialEq)]
pub struct Heuristic {
    pub slug: String,
    /// 命中规则的关键词；走默认分段时由 slug 拆词得到
    pub keywords: Vec<String>,
}

#[derive(Debug, Default, Clone)]
pub struct TopicResolver;

impl TopicResolver {
    pub fn new() -> Self {
        Self
    }

    /// 第 1 步：有序规则表 + 难度分段默认值；`difficulty` 为 0-1 刻度
    pub fn classify(&self, subject: &str, text: &str, difficulty: f64) -> Heuristic {
        let subject = subject.trim().to_lowercase();
        let text = text.to_lowercase();
        let difficulty = LevelScale::Unit.to_unit(difficulty);

        let matched = RULES.iter().find(|r| {
            r.subject == subject
                && r.keywords.iter().any(|k| text.contains(k))
                && !r.excludes.iter().any(|k| text.contains(k))
        });

        if let Some(rule) = matched {
            return Heuristic {
                slug: rule.target.pick(difficulty).to_string(),
                keywords: rule.keywords.iter().map(|k| k.to_string()).collect(),
            };
        }

        let slug = DEFAULT_BANDS
            .iter()
            .find(|(s, _)| *s == subject)
            .and_then(|(_, bands)| bands.iter().find(|(limit, _)| difficulty < *limit))
            .map(|(_, slug)| slug.to_string())
            .unwrap_or_else(|| format!("{}-basic-topic", subject));

        let keywords = slug
            .split('-')
            .filter(|part| *part != subject && part.len() >= 4)
            .map(str::to_string)
            .collect();

        Heuristic { slug, keywords }
    }

    /// 完整解析；`catalog` 为该学科的目录快照，`difficulty` 为 0-1 刻度
    pub fn resolve(
        &self,
        subject: &str,
        text: &str,
        difficulty: f64,
        catalog: &[Topic],
    ) -> ResolvedTopic {
        let subject = subject.trim().to_lowercase();
        let hint = LevelScale::Unit.to_unit(difficulty);
        let heuristic = self.classify(&subject, text, hint);

        if let Some(topic) = catalog
            .iter()
            .find(|t| t.subject == subject && t.slug == heuristic.slug)
        {
            return ResolvedTopic {
                topic: topic.clone(),
                origin: TopicOrigin::ExactSlug,
            };
        }

        if let Some(topic) = Self::keyword_match(&subject, &heuristic.keywords, hint, catalog) {
            debug!(
                "[TopicResolver] slug {} not in catalog, matched {} by keyword",
                heuristic.slug, topic.slug
            );
            return ResolvedTopic {
                topic: topic.clone(),
                origin: TopicOrigin::KeywordMatch,
            };
        }

        debug!(
            "[TopicResolver] No catalog topic for {}, synthesizing",
            heuristic.slug
        );
        ResolvedTopic {
            topic: synthesize(&subject, &heuristic.slug, hint),
            origin: TopicOrigin::Synthesized,
        }
    }

    fn keyword_match<'a>(
        subject: &str,
        keywords: &[String],
        hint: f64,
        catalog: &'a [Topic],
    ) -> Option<&'a Topic> {
        let mut candidates: Vec<&Topic> = catalog
            .iter()
            .filter(|t| t.subject == subject)
            .filter(|t| {
                let slug = t.slug.to_lowercase();
                let name = t.name.to_lowercase();
                keywords
                    .iter()
                    .any(|k| slug.contains(k.as_str()) || name.contains(k.as_str()))
            })
            .collect();

        // 难度接近优先；相同时按 slug，保证与目录返回顺序无关
        candidates.sort_by(|a, b| {
            let da = (a.normalized_difficulty() - hint).abs();
            let db = (b.normalized_difficulty() - hint).abs();
            da.total_cmp(&db).then_with(|| a.slug.cmp(&b.slug))
        });
        candidates.into_iter().next()
    }
}

fn synthesize(subject: &str, slug: &str, hint: f64) -> Topic {
    let name = slug
        .strip_prefix(subject)
        .unwrap_or(slug)
        .split('-')
        .filter(|p| !p.is_empty())
        .map(|p| {
            let mut chars = p.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    Topic::new(
        format!("{}{}", EPHEMERAL_PREFIX, slug),
        slug,
        name,
        subject,
        hint,
    )
}
