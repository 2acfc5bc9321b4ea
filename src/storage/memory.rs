//! 进程内存储实现
//!
//! 所有表放在锁后面；掌握度更新在持锁期间完成整个读-改-写。

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, RwLock};

use super::{QuizStore, StoreError, StoreResult};
use crate::knowledge_graph::models::{MasteryRecord, Topic};
use crate::models::Question;

#[derive(Default)]
pub struct MemoryStore {
    questions: RwLock<HashMap<String, Question>>,
    topics: RwLock<BTreeMap<String, Topic>>,
    mastery: Mutex<HashMap<(String, String), MasteryRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(topics: Vec<Topic>) -> Self {
        let store = Self::new();
        {
            let mut table = store.topics.write().unwrap_or_else(|e| e.into_inner());
            for topic in topics {
                table.insert(topic.id.clone(), topic);
            }
        }
        store
    }

    pub fn question_count(&self) -> usize {
        self.questions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

impl QuizStore for MemoryStore {
    fn get_question(&self, id: &str) -> StoreResult<Option<Question>> {
        let table = self.questions.read().unwrap_or_else(|e| e.into_inner());
        Ok(table.get(id).cloned())
    }

    fn put_question(&self, question: &Question) -> StoreResult<()> {
        let mut table = self.questions.write().unwrap_or_else(|e| e.into_inner());
        table.insert(question.id.clone(), question.clone());
        Ok(())
    }

    fn fill_question_topic(&self, question_id: &str, topic_id: &str) -> StoreResult<String> {
        let mut table = self.questions.write().unwrap_or_else(|e| e.into_inner());
        let question = table
            .get_mut(question_id)
            .ok_or_else(|| StoreError::not_found("Question", question_id))?;
        Ok(question
            .topic_id
            .get_or_insert_with(|| topic_id.to_string())
            .clone())
    }

    fn get_topic(&self, id: &str) -> StoreResult<Option<Topic>> {
        let table = self.topics.read().unwrap_or_else(|e| e.into_inner());
        Ok(table.get(id).cloned())
    }

    fn put_topic(&self, topic: &Topic) -> StoreResult<()> {
        let mut table = self.topics.write().unwrap_or_else(|e| e.into_inner());
        table.insert(topic.id.clone(), topic.clone());
        Ok(())
    }

    fn topics_by_subject(&self, subject: &str) -> StoreResult<Vec<Topic>> {
        let table = self.topics.read().unwrap_or_else(|e| e.into_inner());
        let mut topics: Vec<Topic> = table
            .values()
            .filter(|t| t.subject == subject)
            .cloned()
            .collect();
        topics.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(topics)
    }

    fn get_mastery(&self, user_id: &str, topic_id: &str) -> StoreResult<Option<MasteryRecord>> {
        let table = self.mastery.lock().unwrap_or_else(|e| e.into_inner());
        Ok(table
            .get(&(user_id.to_string(), topic_id.to_string()))
            .cloned())
    }

    fn put_mastery(&self, record: &MasteryRecord) -> StoreResult<()> {
        let mut table = self.mastery.lock().unwrap_or_else(|e| e.into_inner());
        table.insert(
            (record.user_id.clone(), record.topic_id.clone()),
            record.clone(),
        );
        Ok(())
    }

    fn masteries_for_user(&self, user_id: &str) -> StoreResult<Vec<MasteryRecord>> {
        let table = self.mastery.lock().unwrap_or_else(|e| e.into_inner());
        let mut records: Vec<MasteryRecord> = table
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.topic_id.cmp(&b.topic_id));
        Ok(records)
    }

    fn update_mastery(
        &self,
        user_id: &str,
        topic_id: &str,
        apply: &mut dyn FnMut(Option<MasteryRecord>) -> MasteryRecord,
    ) -> StoreResult<MasteryRecord> {
        let mut table = self.mastery.lock().unwrap_or_else(|e| e.into_inner());
        let key = (user_id.to_string(), topic_id.to_string());
        let updated = apply(table.get(&key).cloned());
        table.insert(key, updated.clone());
        Ok(updated)
    }
}
