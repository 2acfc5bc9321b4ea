//! 知识点图谱：主题目录、题目归类、掌握度追踪与推荐
pub mod mastery_tracker;
pub mod models;
pub mod topic_resolver;

pub use mastery_tracker::MasteryTracker;
pub use models::{
    LevelScale, MasteryRecord, SubjectProgress, Topic, TopicProgress, TopicRecommendation,
};
pub use topic_resolver::{ResolvedTopic, TopicOrigin, TopicResolver};
