//! 作答服务
//!
//! 一次提交的处理顺序：
//! 1. 读取题目（不存在 → `NotFound`）
//! 2. 按字符串精确相等判定正误
//! 3. 奖励引擎计算奖励与下一题难度
//! 4. 题目还没有 `topic_id` 时解析主题并一次性回填
//! 5. 更新 `(user_id, topic_id)` 的掌握度

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::difficulty_reward::{
    AnswerSignal, Calibration, DifficultyRewardEngine, RewardBreakdown, DEFAULT_CONFIDENCE,
};
use crate::knowledge_graph::models::{LevelScale, MasteryRecord};
use crate::knowledge_graph::{MasteryTracker, TopicOrigin, TopicResolver};
use crate::models::{AppError, Question};
use crate::storage::QuizStore;

/// 一次作答提交
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerSubmission {
    pub question_id: String,
    pub user_id: String,
    pub user_answer: String,
    pub confidence: Option<f64>,
    pub time_spent_secs: f64,
    /// 当前会话难度（1-10，可带小数）
    pub current_difficulty: f64,
    pub streak: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerOutcome {
    pub is_correct: bool,
    pub reward: f64,
    pub breakdown: RewardBreakdown,
    pub previous_difficulty: f64,
    pub new_difficulty: f64,
    pub calibration: Calibration,
    pub topic_id: String,
    /// 只有本次提交解析并写入了 `topic_id` 时才有值
    pub topic_origin: Option<TopicOrigin>,
    pub mastery: MasteryRecord,
}

pub struct AnswerService {
    store: Arc<dyn QuizStore>,
    engine: DifficultyRewardEngine,
    resolver: TopicResolver,
    tracker: MasteryTracker,
}

impl AnswerService {
    pub fn new(store: Arc<dyn QuizStore>, engine: DifficultyRewardEngine) -> Self {
        let tracker = MasteryTracker::new(store.clone());
        Self::with_tracker(store, engine, tracker)
    }

    pub fn with_tracker(
        store: Arc<dyn QuizStore>,
        engine: DifficultyRewardEngine,
        tracker: MasteryTracker,
    ) -> Self {
        Self {
            store,
            engine,
            resolver: TopicResolver::new(),
            tracker,
        }
    }

    pub fn tracker(&self) -> &MasteryTracker {
        &self.tracker
    }

    pub fn submit(&self, submission: &AnswerSubmission) -> Result<AnswerOutcome, AppError> {
        let question = self
            .store
            .get_question(&submission.question_id)?
            .ok_or_else(|| {
                AppError::not_found(format!("Question not found: {}", submission.question_id))
            })?;

        let is_correct = question.is_correct_answer(&submission.user_answer);
        let outcome = self.engine.evaluate(&AnswerSignal {
            is_correct,
            confidence: submission.confidence,
            time_spent_secs: submission.time_spent_secs,
            current_difficulty: submission.current_difficulty,
            streak: submission.streak,
        });

        let (topic_id, topic_origin) = self.ensure_topic(&question)?;

        let mastery = self.tracker.record_answer(
            &submission.user_id,
            &topic_id,
            is_correct,
            submission.confidence.unwrap_or(DEFAULT_CONFIDENCE),
        )?;

        info!(
            "[AnswerService] user={}, question={}, correct={}, reward={:.3}, difficulty {} -> {}",
            submission.user_id,
            question.id,
            is_correct,
            outcome.reward,
            outcome.previous_difficulty,
            outcome.new_difficulty
        );

        Ok(AnswerOutcome {
            is_correct,
            reward: outcome.reward,
            breakdown: outcome.breakdown,
            previous_difficulty: outcome.previous_difficulty,
            new_difficulty: outcome.new_difficulty,
            calibration: outcome.calibration,
            topic_id,
            topic_origin,
            mastery,
        })
    }

    /// 已有 `topic_id` 直接返回；否则解析并回填
    fn ensure_topic(&self, question: &Question) -> Result<(String, Option<TopicOrigin>), AppError> {
        if let Some(topic_id) = &question.topic_id {
            return Ok((topic_id.clone(), None));
        }

        let catalog = self.store.topics_by_subject(&question.subject)?;
        // 题目难度是 1-10 整数，解析器使用 0-1 的提示值
        let hint = LevelScale::TenPoint.to_unit(f64::from(question.difficulty));
        let resolved = self
            .resolver
            .resolve(&question.subject, &question.text, hint, &catalog);

        // 并发提交时以先写入者为准；落败时本次解析的来源不再适用
        let topic_id = self
            .store
            .fill_question_topic(&question.id, &resolved.topic.id)?;
        if topic_id != resolved.topic.id {
            debug!(
                "[AnswerService] question={} already filled with topic={}, resolved {} discarded",
                question.id, topic_id, resolved.topic.id
            );
            return Ok((topic_id, None));
        }
        debug!(
            "[AnswerService] question={} topic={} ({:?})",
            question.id, topic_id, resolved.origin
        );
        Ok((topic_id, Some(resolved.origin)))
    }
}
