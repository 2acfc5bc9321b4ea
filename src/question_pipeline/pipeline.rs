/// 出题管线 - 核心业务逻辑
///
/// 流程：Prompt → 补全 → 解析 → 结构校验 → （数学）复核 → 打乱选项 → 分配 id → 落库
///
/// - 补全失败、解析失败、校验失败、复核拒绝：记录原因后改用兜底题，从不向调用方报错
/// - 只有落库失败会以 `AppError` 返回
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::extractor::ContentExtractor;
use super::fallback::FallbackGenerator;
use super::math_verifier::{MathVerifier, VerificationOutcome};
use super::shuffler::ChoiceShuffler;
use super::types::QuestionCandidate;
use super::validator::validate;
use crate::llm_manager::{CompletionClient, PromptBuilder};
use crate::models::{is_math_subject, normalize_difficulty, AppError, Question, SourceEvent};
use crate::storage::QuizStore;
use crate::utils::text::log_preview;

/// 管线依赖
pub struct QuestionPipelineDeps {
    pub client: Arc<dyn CompletionClient>,
    pub store: Arc<dyn QuizStore>,
}

pub struct QuestionPipeline<R: RngCore = StdRng> {
    client: Arc<dyn CompletionClient>,
    store: Arc<dyn QuizStore>,
    prompts: PromptBuilder,
    extractor: ContentExtractor,
    verifier: MathVerifier,
    shuffler: ChoiceShuffler,
    fallback: FallbackGenerator,
    rng: R,
}

impl QuestionPipeline<StdRng> {
    pub fn new(deps: QuestionPipelineDeps) -> Self {
        Self::with_rng(deps, StdRng::from_entropy())
    }
}

impl<R: RngCore> QuestionPipeline<R> {
    /// 注入确定性随机源（测试用）
    pub fn with_rng(deps: QuestionPipelineDeps, rng: R) -> Self {
        Self {
            client: deps.client,
            store: deps.store,
            prompts: PromptBuilder::default(),
            extractor: ContentExtractor::new(),
            verifier: MathVerifier::new(),
            shuffler: ChoiceShuffler::new(),
            fallback: FallbackGenerator::new(),
            rng,
        }
    }

    pub fn with_prompts(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    /// 生成并落库一道题
    pub fn generate(&mut self, subject: &str, difficulty: f64) -> Result<Question, AppError> {
        let candidate = self.produce_candidate(subject, difficulty);

        let question = Question {
            id: Uuid::new_v4().to_string(),
            text: candidate.text,
            options: candidate.options,
            correct_answer: candidate.correct_answer,
            difficulty: candidate.difficulty,
            subject: candidate.subject,
            source: candidate.source,
            topic_id: None,
            created_at: Utc::now(),
        };

        self.store.put_question(&question)?;
        info!(
            "[QuestionPipeline] Saved question {} (subject={}, difficulty={}, source={})",
            question.id, question.subject, question.difficulty, question.source
        );
        Ok(question)
    }

    /// 不落库的候选生成；总能返回结构合法的题目
    pub fn produce_candidate(&mut self, subject: &str, difficulty: f64) -> QuestionCandidate {
        let subject = subject.trim().to_lowercase();
        let level = normalize_difficulty(difficulty);
        match self.try_ai_candidate(&subject, difficulty, level) {
            Some(candidate) => candidate,
            None => {
                let candidate = self.fallback.generate(&subject, level, &mut self.rng);
                info!(
                    "[QuestionPipeline] Using fallback question: {}",
                    candidate.text
                );
                candidate
            }
        }
    }

    fn try_ai_candidate(&mut self, subject: &str, difficulty: f64, level: u8) -> Option<QuestionCandidate> {
        let prompt = self.prompts.build(subject, difficulty, &mut self.rng);

        let raw = match self.client.complete(&prompt) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("[QuestionPipeline] Completion failed: {}", e);
                return None;
            }
        };

        let candidate = match self.extractor.extract(&raw, subject, level) {
            Ok(candidate) => candidate,
            Err(e) => {
                warn!(
                    "[QuestionPipeline] Extraction failed ({}): {}",
                    e,
                    log_preview(&raw, 200)
                );
                return None;
            }
        };

        if let Err(e) = validate(&candidate) {
            warn!("[QuestionPipeline] Validation failed: {}", e);
            return None;
        }

        let candidate = if is_math_subject(subject) {
            let outcome = self.verifier.verify(candidate);
            match &outcome {
                VerificationOutcome::Corrected {
                    declared, expected, ..
                } => info!(
                    "[QuestionPipeline] Corrected math answer {:?} -> {}",
                    declared, expected
                ),
                VerificationOutcome::Rejected { reason } => {
                    warn!("[QuestionPipeline] Math verification rejected: {}", reason)
                }
                _ => {}
            }
            if outcome.event() == SourceEvent::Rejected {
                return None;
            }
            let candidate = outcome.into_candidate()?;
            // 修正后的题目重新过一遍结构校验
            if let Err(e) = validate(&candidate) {
                warn!("[QuestionPipeline] Corrected candidate invalid: {}", e);
                return None;
            }
            candidate
        } else {
            candidate
        };

        Some(self.shuffler.shuffle(candidate, &mut self.rng))
    }
}
