use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 知识点目录中的一个主题（只读）
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Topic {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub subject: String,
    /// 始终是 0-1 刻度；1-10 刻度的目录经 `LevelScale::TenPoint` 折算后再入库
    pub difficulty_level: f64,
    #[serde(default)]
    pub prerequisites: BTreeSet<String>,
}

impl Topic {
    pub fn new(
        id: impl Into<String>,
        slug: impl Into<String>,
        name: impl Into<String>,
        subject: impl Into<String>,
        difficulty_level: f64,
    ) -> Self {
        Self {
            id: id.into(),
            slug: slug.into(),
            name: name.into(),
            subject: subject.into(),
            difficulty_level,
            prerequisites: BTreeSet::new(),
        }
    }

    pub fn with_prerequisites<I, S>(mut self, prerequisites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prerequisites = prerequisites.into_iter().map(Into::into).collect();
        self
    }

    /// 按声明的刻度把难度折算到 0-1
    pub fn rescaled(mut self, scale: LevelScale) -> Self {
        self.difficulty_level = scale.to_unit(self.difficulty_level);
        self
    }

    pub fn normalized_difficulty(&self) -> f64 {
        LevelScale::Unit.to_unit(self.difficulty_level)
    }
}

/// 难度值所用的刻度，由数据来源声明，不从数值大小推断
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LevelScale {
    /// 0-1
    #[default]
    Unit,
    /// 1-10
    TenPoint,
}

impl LevelScale {
    /// 折算到 0-1 并截断；非有限值记为 0
    pub fn to_unit(self, level: f64) -> f64 {
        if !level.is_finite() {
            return 0.0;
        }
        let unit = match self {
            LevelScale::Unit => level,
            LevelScale::TenPoint => level / 10.0,
        };
        unit.clamp(0.0, 1.0)
    }
}

/// 用户在某主题上的掌握度记录
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MasteryRecord {
    pub user_id: String,
    pub topic_id: String,
    pub attempted: u32,
    pub correct: u32,
    pub mastery_level: f64,
    pub consecutive_correct: u32,
    pub confidence: f64,
    pub last_practiced: DateTime<Utc>,
}

/// 推荐结果中的一项
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TopicRecommendation {
    pub topic: Topic,
    pub current_mastery: f64,
}

/// 学科下单个主题的进度行
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TopicProgress {
    pub topic: Topic,
    pub mastery_level: f64,
    pub attempted: u32,
    pub correct: u32,
    pub last_practiced: Option<DateTime<Utc>>,
    pub confidence: Option<f64>,
}

/// 学科整体进度
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SubjectProgress {
    pub subject: String,
    /// 已掌握主题占比（0-100，四舍五入）
    pub overall_progress: u32,
    pub total_topics: usize,
    pub mastered_topics: usize,
    pub topics: Vec<TopicProgress>,
}

fn topic(slug: &str, name: &str, subject: &str, level: f64, prerequisites: &[&str]) -> Topic {
    Topic::new(format!("topic-{}", slug), slug, name, subject, level)
        .with_prerequisites(prerequisites.iter().map(|p| format!("topic-{}", p)))
}

/// 内置知识点目录，供没有外部目录时播种使用
pub fn default_catalog() -> Vec<Topic> {
    vec![
        topic("math-basic-arithmetic", "Basic Arithmetic", "math", 0.1, &[]),
        topic("math-fractions", "Fractions", "math", 0.3, &["math-basic-arithmetic"]),
        topic("math-decimals", "Decimals", "math", 0.35, &["math-basic-arithmetic"]),
        topic(
            "math-percentages",
            "Percentages",
            "math",
            0.4,
            &["math-fractions", "math-decimals"],
        ),
        topic("math-basic-algebra", "Basic Algebra", "math", 0.5, &["math-basic-arithmetic"]),
        topic(
            "math-linear-equations",
            "Linear Equations",
            "math",
            0.55,
            &["math-basic-algebra"],
        ),
        topic("math-basic-geometry", "Basic Geometry", "math", 0.5, &["math-basic-arithmetic"]),
        topic(
            "math-quadratic-equations",
            "Quadratic Equations",
            "math",
            0.75,
            &["math-linear-equations"],
        ),
        topic(
            "math-trigonometry",
            "Trigonometry",
            "math",
            0.8,
            &["math-basic-geometry", "math-basic-algebra"],
        ),
        topic("science-atoms-elements", "Atoms and Elements", "science", 0.2, &[]),
        topic(
            "science-chemical-bonds",
            "Chemical Bonds",
            "science",
            0.4,
            &["science-atoms-elements"],
        ),
        topic(
            "science-chemical-reactions",
            "Chemical Reactions",
            "science",
            0.5,
            &["science-chemical-bonds"],
        ),
        topic("science-cell-structure", "Cell Structure", "science", 0.3, &[]),
        topic(
            "science-photosynthesis",
            "Photosynthesis",
            "science",
            0.45,
            &["science-cell-structure"],
        ),
        topic(
            "science-genetics-basics",
            "Genetics Basics",
            "science",
            0.7,
            &["science-cell-structure"],
        ),
        topic("science-forces-motion", "Forces and Motion", "science", 0.35, &[]),
        topic("science-energy", "Energy", "science", 0.45, &["science-forces-motion"]),
        topic(
            "history-ancient-civilizations",
            "Ancient Civilizations",
            "history",
            0.2,
            &[],
        ),
        topic(
            "history-classical-antiquity",
            "Classical Antiquity",
            "history",
            0.3,
            &["history-ancient-civilizations"],
        ),
        topic(
            "history-medieval-period",
            "Medieval Period",
            "history",
            0.45,
            &["history-classical-antiquity"],
        ),
        topic(
            "history-renaissance",
            "Renaissance",
            "history",
            0.5,
            &["history-medieval-period"],
        ),
        topic("history-world-war-1", "World War I", "history", 0.6, &[]),
        topic(
            "history-world-war-2",
            "World War II",
            "history",
            0.65,
            &["history-world-war-1"],
        ),
        topic("history-cold-war", "Cold War", "history", 0.75, &["history-world-war-2"]),
        topic("english-parts-speech", "Parts of Speech", "english", 0.2, &[]),
        topic(
            "english-sentence-structure",
            "Sentence Structure",
            "english",
            0.3,
            &["english-parts-speech"],
        ),
        topic("english-punctuation", "Punctuation", "english", 0.3, &[]),
        topic("english-vocabulary-building", "Vocabulary Building", "english", 0.35, &[]),
        topic(
            "english-writing-basics",
            "Writing Basics",
            "english",
            0.5,
            &["english-sentence-structure", "english-punctuation"],
        ),
        topic(
            "english-literary-devices",
            "Literary Devices",
            "english",
            0.6,
            &["english-vocabulary-building"],
        ),
        topic(
            "english-essay-writing",
            "Essay Writing",
            "english",
            0.7,
            &["english-writing-basics"],
        ),
        topic(
            "english-literature-analysis",
            "Literature Analysis",
            "english",
            0.8,
            &["english-literary-devices"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_scale_is_declared_not_guessed() {
        assert_eq!(LevelScale::Unit.to_unit(0.4), 0.4);
        assert_eq!(LevelScale::Unit.to_unit(7.0), 1.0);
        assert_eq!(LevelScale::Unit.to_unit(-3.0), 0.0);
        assert_eq!(LevelScale::TenPoint.to_unit(7.0), 0.7);
        assert_eq!(LevelScale::TenPoint.to_unit(1.0), 0.1);
        assert_eq!(LevelScale::TenPoint.to_unit(f64::NAN), 0.0);

        // 1-10 刻度上的 1 是最容易的一档
        let easy = Topic::new("t-easy", "math-a", "A", "math", 1.0).rescaled(LevelScale::TenPoint);
        let hard = Topic::new("t-hard", "math-b", "B", "math", 9.0).rescaled(LevelScale::TenPoint);
        assert!(easy.normalized_difficulty() < hard.normalized_difficulty());
        assert_eq!(easy.difficulty_level, 0.1);
    }

    #[test]
    fn test_default_catalog_prerequisites_exist() {
        let catalog = default_catalog();
        let ids: BTreeSet<&str> = catalog.iter().map(|t| t.id.as_str()).collect();
        for topic in &catalog {
            assert!(topic.slug.starts_with(&topic.subject));
            for prerequisite in &topic.prerequisites {
                assert!(ids.contains(prerequisite.as_str()), "{}", prerequisite);
            }
        }
    }
}
