//! 主题掌握度追踪
//!
//! - 每次作答对 `(user_id, topic_id)` 做一次串行化的读-改-写
//! - 掌握度是精确的累计正确率，不做衰减或平滑
//! - 推荐：前置主题全部达到掌握线（或没有前置）、自身尚未掌握的主题，
//!   按 (难度升序, 当前掌握度降序) 排列

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::models::{MasteryRecord, SubjectProgress, Topic, TopicProgress, TopicRecommendation};
use crate::storage::{QuizStore, StoreResult};

/// 默认掌握线
pub const DEFAULT_MASTERY_THRESHOLD: f64 = 0.8;

/// 把一次作答叠加到已有记录上（纯函数）
pub fn apply_observation(
    existing: Option<MasteryRecord>,
    user_id: &str,
    topic_id: &str,
    is_correct: bool,
    confidence: f64,
    now: DateTime<Utc>,
) -> MasteryRecord {
    let confidence = if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        0.5
    };

    match existing {
        None => MasteryRecord {
            user_id: user_id.to_string(),
            topic_id: topic_id.to_string(),
            attempted: 1,
            correct: u32::from(is_correct),
            mastery_level: if is_correct { 1.0 } else { 0.0 },
            consecutive_correct: u32::from(is_correct),
            confidence,
            last_practiced: now,
        },
        Some(mut record) => {
            record.attempted += 1;
            if is_correct {
                record.correct += 1;
                record.consecutive_correct += 1;
            } else {
                record.consecutive_correct = 0;
            }
            record.mastery_level = record.correct as f64 / record.attempted as f64;
            record.confidence = confidence;
            record.last_practiced = now;
            record
        }
    }
}

pub struct MasteryTracker {
    store: Arc<dyn QuizStore>,
    threshold: f64,
}

impl MasteryTracker {
    pub fn new(store: Arc<dyn QuizStore>) -> Self {
        Self::with_threshold(store, DEFAULT_MASTERY_THRESHOLD)
    }

    pub fn with_threshold(store: Arc<dyn QuizStore>, threshold: f64) -> Self {
        Self { store, threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// 记录一次作答，返回更新后的记录
    pub fn record_answer(
        &self,
        user_id: &str,
        topic_id: &str,
        is_correct: bool,
        confidence: f64,
    ) -> StoreResult<MasteryRecord> {
        let now = Utc::now();
        let record = self.store.update_mastery(user_id, topic_id, &mut |existing| {
            apply_observation(existing, user_id, topic_id, is_correct, confidence, now)
        })?;

        debug!(
            "[MasteryTracker] user={}, topic={}, correct={}, mastery={:.3} ({}/{})",
            user_id, topic_id, is_correct, record.mastery_level, record.correct, record.attempted
        );
        Ok(record)
    }

    fn mastery_map(&self, user_id: &str) -> StoreResult<HashMap<String, MasteryRecord>> {
        Ok(self
            .store
            .masteries_for_user(user_id)?
            .into_iter()
            .map(|r| (r.topic_id.clone(), r))
            .collect())
    }

    /// 推荐下一批可学习的主题
    pub fn recommend(
        &self,
        user_id: &str,
        subject: &str,
        limit: usize,
    ) -> StoreResult<Vec<TopicRecommendation>> {
        let topics = self.store.topics_by_subject(subject)?;
        let mastery = self.mastery_map(user_id)?;
        let level_of = |topic_id: &str| {
            mastery
                .get(topic_id)
                .map(|r| r.mastery_level)
                .unwrap_or(0.0)
        };

        let mut available: Vec<TopicRecommendation> = topics
            .into_iter()
            .filter(|t| level_of(&t.id) < self.threshold)
            .filter(|t| {
                t.prerequisites
                    .iter()
                    .all(|p| level_of(p) >= self.threshold)
            })
            .map(|t| TopicRecommendation {
                current_mastery: level_of(&t.id),
                topic: t,
            })
            .collect();

        available.sort_by(|a, b| {
            a.topic
                .normalized_difficulty()
                .total_cmp(&b.topic.normalized_difficulty())
                .then_with(|| b.current_mastery.total_cmp(&a.current_mastery))
                .then_with(|| a.topic.slug.cmp(&b.topic.slug))
        });
        available.truncate(limit);

        info!(
            "[MasteryTracker] {} recommendations for user={}, subject={}",
            available.len(),
            user_id,
            subject
        );
        Ok(available)
    }

    /// 学科整体进度：没有记录的主题按 0 计
    pub fn subject_progress(&self, user_id: &str, subject: &str) -> StoreResult<SubjectProgress> {
        let mut topics = self.store.topics_by_subject(subject)?;
        topics.sort_by(|a, b| {
            a.normalized_difficulty()
                .total_cmp(&b.normalized_difficulty())
                .then_with(|| a.name.cmp(&b.name))
        });
        let mastery = self.mastery_map(user_id)?;

        let rows: Vec<TopicProgress> = topics
            .into_iter()
            .map(|topic| match mastery.get(&topic.id) {
                Some(r) => TopicProgress {
                    mastery_level: r.mastery_level,
                    attempted: r.attempted,
                    correct: r.correct,
                    last_practiced: Some(r.last_practiced),
                    confidence: Some(r.confidence),
                    topic,
                },
                None => TopicProgress {
                    mastery_level: 0.0,
                    attempted: 0,
                    correct: 0,
                    last_practiced: None,
                    confidence: None,
                    topic,
                },
            })
            .collect();

        let total_topics = rows.len();
        let mastered_topics = rows
            .iter()
            .filter(|r| r.mastery_level >= self.threshold)
            .count();
        let overall_progress = if total_topics > 0 {
            ((mastered_topics as f64 / total_topics as f64) * 100.0).round() as u32
        } else {
            0
        };

        Ok(SubjectProgress {
            subject: subject.to_string(),
            overall_progress,
            total_topics,
            mastered_topics,
            topics: rows,
        })
    }

    /// 主题的直接前置主题，按难度升序；目录中缺失的 id 被跳过
    pub fn topic_prerequisites(&self, topic_id: &str) -> StoreResult<Vec<Topic>> {
        let Some(topic) = self.store.get_topic(topic_id)? else {
            return Ok(Vec::new());
        };

        let mut prerequisites = Vec::with_capacity(topic.prerequisites.len());
        for id in &topic.prerequisites {
            if let Some(p) = self.store.get_topic(id)? {
                prerequisites.push(p);
            }
        }
        prerequisites.sort_by(|a, b| {
            a.normalized_difficulty()
                .total_cmp(&b.normalized_difficulty())
                .then_with(|| a.slug.cmp(&b.slug))
        });
        Ok(prerequisites)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge_graph::models::default_catalog;
    use crate::storage::MemoryStore;

    fn tracker() -> MasteryTracker {
        MasteryTracker::new(Arc::new(MemoryStore::with_catalog(default_catalog())))
    }

    #[test]
    fn test_first_observation() {
        let now = Utc::now();
        let r = apply_observation(None, "u1", "t1", false, 0.3, now);
        assert_eq!((r.attempted, r.correct, r.consecutive_correct), (1, 0, 0));
        assert_eq!(r.mastery_level, 0.0);
        assert_eq!(r.confidence, 0.3);

        let r = apply_observation(None, "u1", "t1", true, 0.9, now);
        assert_eq!((r.attempted, r.correct, r.consecutive_correct), (1, 1, 1));
        assert_eq!(r.mastery_level, 1.0);
    }

    #[test]
    fn test_incorrect_then_correct_sequence() {
        let tracker = tracker();
        let first = tracker.record_answer("u1", "topic-math-fractions", false, 0.5).unwrap();
        let second = tracker.record_answer("u1", "topic-math-fractions", true, 0.8).unwrap();

        assert_eq!(first.mastery_level, 0.0);
        assert_eq!(first.consecutive_correct, 0);
        assert_eq!(second.mastery_level, 0.5);
        assert_eq!(second.consecutive_correct, 1);
        assert_eq!(second.attempted, 2);
        assert_eq!(second.confidence, 0.8);
    }

    #[test]
    fn test_running_ratio_is_exact() {
        let tracker = tracker();
        let pattern = [true, true, false, true, false, false, true];
        let mut correct = 0;
        for (i, is_correct) in pattern.iter().enumerate() {
            if *is_correct {
                correct += 1;
            }
            let r = tracker
                .record_answer("u2", "topic-math-decimals", *is_correct, 0.6)
                .unwrap();
            assert_eq!(r.attempted as usize, i + 1);
            assert_eq!(r.mastery_level, correct as f64 / (i + 1) as f64);
        }
    }

    #[test]
    fn test_recommendations_respect_prerequisites() {
        let tracker = tracker();
        let recs = tracker.recommend("new-user", "math", 10).unwrap();
        let slugs: Vec<&str> = recs.iter().map(|r| r.topic.slug.as_str()).collect();
        // 新用户只能学没有前置的主题
        assert_eq!(slugs, vec!["math-basic-arithmetic"]);

        for _ in 0..5 {
            tracker
                .record_answer("new-user", "topic-math-basic-arithmetic", true, 0.9)
                .unwrap();
        }
        let recs = tracker.recommend("new-user", "math", 3).unwrap();
        let slugs: Vec<&str> = recs.iter().map(|r| r.topic.slug.as_str()).collect();
        assert_eq!(
            slugs,
            vec!["math-fractions", "math-decimals", "math-basic-algebra"]
        );
    }

    #[test]
    fn test_subject_progress_and_prerequisites() {
        let tracker = tracker();
        for _ in 0..4 {
            tracker
                .record_answer("u3", "topic-english-parts-speech", true, 0.9)
                .unwrap();
        }
        let progress = tracker.subject_progress("u3", "english").unwrap();
        assert_eq!(progress.total_topics, 8);
        assert_eq!(progress.mastered_topics, 1);
        assert_eq!(progress.overall_progress, 13);
        assert_eq!(progress.topics[0].topic.slug, "english-parts-speech");
        assert_eq!(progress.topics[0].attempted, 4);

        let prereqs = tracker
            .topic_prerequisites("topic-math-percentages")
            .unwrap();
        let ids: Vec<&str> = prereqs.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["topic-math-fractions", "topic-math-decimals"]);
        assert!(tracker.topic_prerequisites("missing").unwrap().is_empty());
    }
}
