//! 持久化协作方
//!
//! 核心逻辑只依赖 `QuizStore` trait：
//! - 题目 / 主题 / 掌握度的按 id 读写
//! - 按学科查询主题目录
//! - `(user_id, topic_id)` 掌握度的串行化读-改-写
//!
//! 提供两种实现：`MemoryStore`（测试与嵌入场景）和 `SqliteStore`（r2d2 连接池）。

pub mod error;
pub mod memory;
pub mod sqlite;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::knowledge_graph::models::{LevelScale, MasteryRecord, Topic};
use crate::models::Question;

pub trait QuizStore: Send + Sync {
    fn get_question(&self, id: &str) -> StoreResult<Option<Question>>;

    fn put_question(&self, question: &Question) -> StoreResult<()>;

    /// 题目持久化后唯一允许的修改：`topic_id` 的一次性惰性回填。
    ///
    /// 已有 `topic_id` 时保持不变，返回最终生效的值。
    fn fill_question_topic(&self, question_id: &str, topic_id: &str) -> StoreResult<String>;

    fn get_topic(&self, id: &str) -> StoreResult<Option<Topic>>;

    fn put_topic(&self, topic: &Topic) -> StoreResult<()>;

    /// 学科下的全部主题，按 slug 升序（保证快照顺序稳定）
    fn topics_by_subject(&self, subject: &str) -> StoreResult<Vec<Topic>>;

    fn get_mastery(&self, user_id: &str, topic_id: &str) -> StoreResult<Option<MasteryRecord>>;

    fn put_mastery(&self, record: &MasteryRecord) -> StoreResult<()>;

    fn masteries_for_user(&self, user_id: &str) -> StoreResult<Vec<MasteryRecord>>;

    /// 串行化的读-改-写：同一 `(user_id, topic_id)` 的并发提交不会丢失更新
    fn update_mastery(
        &self,
        user_id: &str,
        topic_id: &str,
        apply: &mut dyn FnMut(Option<MasteryRecord>) -> MasteryRecord,
    ) -> StoreResult<MasteryRecord>;

    /// 批量写入 0-1 刻度的主题目录（播种用）
    fn seed_topics(&self, topics: &[Topic]) -> StoreResult<usize> {
        self.seed_topics_on_scale(topics, LevelScale::Unit)
    }

    /// 按声明的刻度折算难度后写入，库内一律存 0-1
    fn seed_topics_on_scale(&self, topics: &[Topic], scale: LevelScale) -> StoreResult<usize> {
        for topic in topics {
            self.put_topic(&topic.clone().rescaled(scale))?;
        }
        Ok(topics.len())
    }
}
