/// 出题管线
///
/// 职责：
/// - 把补全接口的自由文本变成结构与领域都经过校验的选择题
/// - 校验或复核失败时保证产出答案正确的兜底题
///
/// 各阶段在落库前都没有副作用，可以安全重试。
pub mod extractor;
pub mod fallback;
pub mod math_forms;
pub mod math_verifier;
pub mod pipeline;
pub mod shuffler;
pub mod types;
pub mod validator;

pub use extractor::ContentExtractor;
pub use fallback::{FallbackGenerator, MathTier};
pub use math_forms::MathForm;
pub use math_verifier::{MathVerifier, VerificationOutcome};
pub use pipeline::{QuestionPipeline, QuestionPipelineDeps};
pub use shuffler::ChoiceShuffler;
pub use types::{ExtractionFailure, QuestionCandidate, ValidationFailure};
pub use validator::validate;
