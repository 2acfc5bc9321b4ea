//! SQLite 存储实现
//!
//! 使用 r2d2 连接池，支持并发访问。
//!
//! ## 设计原则
//! - **单一数据库**：题目、主题目录、掌握度放在同一个文件
//! - **连接池管理**：WAL 模式 + busy_timeout，避免无界等待
//! - **掌握度更新**：`BEGIN IMMEDIATE` 事务内完成读-改-写，同一用户/主题的并发提交串行化

use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{QuizStore, StoreError, StoreResult};
use crate::knowledge_graph::models::{MasteryRecord, Topic};
use crate::models::{Question, QuestionSource};

/// SQLite 连接池类型
pub type SqlitePool = Pool<SqliteConnectionManager>;

/// SQLite 池化连接类型
pub type SqlitePooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS questions (
    id TEXT PRIMARY KEY,
    text TEXT NOT NULL,
    options TEXT NOT NULL,
    correct_answer TEXT NOT NULL,
    difficulty INTEGER NOT NULL,
    subject TEXT NOT NULL,
    source TEXT NOT NULL,
    topic_id TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS topics (
    id TEXT PRIMARY KEY,
    slug TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    subject TEXT NOT NULL,
    difficulty_level REAL NOT NULL,
    prerequisites TEXT NOT NULL DEFAULT '[]'
);

CREATE INDEX IF NOT EXISTS idx_topics_subject ON topics(subject);

CREATE TABLE IF NOT EXISTS topic_mastery (
    user_id TEXT NOT NULL,
    topic_id TEXT NOT NULL,
    attempted INTEGER NOT NULL,
    correct INTEGER NOT NULL,
    mastery_level REAL NOT NULL,
    consecutive_correct INTEGER NOT NULL,
    confidence REAL NOT NULL,
    last_practiced TEXT NOT NULL,
    PRIMARY KEY (user_id, topic_id)
);
"#;

/// 把 JSON 列解析错误包装成 rusqlite 的列转换错误
fn json_column<T: serde::de::DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_question(row: &Row) -> rusqlite::Result<Question> {
    let source_raw: String = row.get(6)?;
    let source = QuestionSource::from_str(&source_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            Type::Text,
            format!("unknown question source: {}", source_raw).into(),
        )
    })?;

    Ok(Question {
        id: row.get(0)?,
        text: row.get(1)?,
        options: json_column(row, 2)?,
        correct_answer: row.get(3)?,
        difficulty: row.get(4)?,
        subject: row.get(5)?,
        source,
        topic_id: row.get(7)?,
        created_at: row.get::<_, DateTime<Utc>>(8)?,
    })
}

fn row_to_topic(row: &Row) -> rusqlite::Result<Topic> {
    Ok(Topic {
        id: row.get(0)?,
        slug: row.get(1)?,
        name: row.get(2)?,
        subject: row.get(3)?,
        difficulty_level: row.get(4)?,
        prerequisites: json_column::<BTreeSet<String>>(row, 5)?,
    })
}

fn row_to_mastery(row: &Row) -> rusqlite::Result<MasteryRecord> {
    Ok(MasteryRecord {
        user_id: row.get(0)?,
        topic_id: row.get(1)?,
        attempted: row.get(2)?,
        correct: row.get(3)?,
        mastery_level: row.get(4)?,
        consecutive_correct: row.get(5)?,
        confidence: row.get(6)?,
        last_practiced: row.get::<_, DateTime<Utc>>(7)?,
    })
}

const MASTERY_COLUMNS: &str = "user_id, topic_id, attempted, correct, mastery_level, \
     consecutive_correct, confidence, last_practiced";

/// SQLite 存储
pub struct SqliteStore {
    pool: SqlitePool,
    db_path: Option<PathBuf>,
}

impl SqliteStore {
    /// 打开（必要时创建）数据库文件并建表
    pub fn open(db_path: &Path) -> StoreResult<Self> {
        info!("[SqliteStore] Opening quiz database: {}", db_path.display());

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "busy_timeout", 5000i64)?;
            Ok(())
        });

        let pool = Pool::builder()
            .max_size(8)
            .min_idle(Some(1))
            .connection_timeout(Duration::from_secs(5))
            .build(manager)
            .map_err(|e| StoreError::Pool(format!("Failed to create connection pool: {}", e)))?;

        let store = Self {
            pool,
            db_path: Some(db_path.to_path_buf()),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// 内存数据库：只保留一个连接，否则每个连接都是独立的库
    pub fn open_in_memory() -> StoreResult<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| StoreError::Pool(format!("Failed to create connection pool: {}", e)))?;

        let store = Self {
            pool,
            db_path: None,
        };
        store.initialize_schema()?;
        Ok(store)
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn initialize_schema(&self) -> StoreResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(SCHEMA_SQL)?;
        debug!("[SqliteStore] Schema ready");
        Ok(())
    }

    pub fn get_conn(&self) -> StoreResult<SqlitePooledConnection> {
        self.pool
            .get()
            .map_err(|e| StoreError::Pool(format!("Failed to get connection: {}", e)))
    }

    fn query_mastery(
        conn: &Connection,
        user_id: &str,
        topic_id: &str,
    ) -> StoreResult<Option<MasteryRecord>> {
        let sql = format!(
            "SELECT {} FROM topic_mastery WHERE user_id = ?1 AND topic_id = ?2",
            MASTERY_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![user_id, topic_id], row_to_mastery)
            .optional()?)
    }

    fn upsert_mastery(conn: &Connection, record: &MasteryRecord) -> StoreResult<()> {
        conn.execute(
            r#"
            INSERT INTO topic_mastery (
                user_id, topic_id, attempted, correct, mastery_level,
                consecutive_correct, confidence, last_practiced
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(user_id, topic_id) DO UPDATE SET
                attempted = excluded.attempted,
                correct = excluded.correct,
                mastery_level = excluded.mastery_level,
                consecutive_correct = excluded.consecutive_correct,
                confidence = excluded.confidence,
                last_practiced = excluded.last_practiced
            "#,
            params![
                record.user_id,
                record.topic_id,
                record.attempted,
                record.correct,
                record.mastery_level,
                record.consecutive_correct,
                record.confidence,
                record.last_practiced,
            ],
        )?;
        Ok(())
    }
}

impl QuizStore for SqliteStore {
    fn get_question(&self, id: &str) -> StoreResult<Option<Question>> {
        let conn = self.get_conn()?;
        Ok(conn
            .query_row(
                "SELECT id, text, options, correct_answer, difficulty, subject, source, topic_id, created_at
                 FROM questions WHERE id = ?1",
                params![id],
                row_to_question,
            )
            .optional()?)
    }

    fn put_question(&self, question: &Question) -> StoreResult<()> {
        let conn = self.get_conn()?;
        let options = serde_json::to_string(&question.options)?;
        conn.execute(
            "INSERT INTO questions (id, text, options, correct_answer, difficulty, subject, source, topic_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                question.id,
                question.text,
                options,
                question.correct_answer,
                question.difficulty,
                question.subject,
                question.source.as_str(),
                question.topic_id,
                question.created_at,
            ],
        )?;
        debug!(
            "[SqliteStore] Saved question {} (source={})",
            question.id, question.source
        );
        Ok(())
    }

    fn fill_question_topic(&self, question_id: &str, topic_id: &str) -> StoreResult<String> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            "UPDATE questions SET topic_id = ?1 WHERE id = ?2 AND topic_id IS NULL",
            params![topic_id, question_id],
        )?;

        let effective: Option<Option<String>> = conn
            .query_row(
                "SELECT topic_id FROM questions WHERE id = ?1",
                params![question_id],
                |row| row.get(0),
            )
            .optional()?;

        match effective {
            None => Err(StoreError::not_found("Question", question_id)),
            Some(Some(existing)) => {
                if changed == 0 && existing != topic_id {
                    debug!(
                        "[SqliteStore] Question {} already bound to topic {}",
                        question_id, existing
                    );
                }
                Ok(existing)
            }
            Some(None) => {
                warn!(
                    "[SqliteStore] topic_id still empty after fill: question={}",
                    question_id
                );
                Err(StoreError::Database(format!(
                    "failed to bind topic for question {}",
                    question_id
                )))
            }
        }
    }

    fn get_topic(&self, id: &str) -> StoreResult<Option<Topic>> {
        let conn = self.get_conn()?;
        Ok(conn
            .query_row(
                "SELECT id, slug, name, subject, difficulty_level, prerequisites FROM topics WHERE id = ?1",
                params![id],
                row_to_topic,
            )
            .optional()?)
    }

    fn put_topic(&self, topic: &Topic) -> StoreResult<()> {
        let conn = self.get_conn()?;
        let prerequisites = serde_json::to_string(&topic.prerequisites)?;
        conn.execute(
            r#"
            INSERT INTO topics (id, slug, name, subject, difficulty_level, prerequisites)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                slug = excluded.slug,
                name = excluded.name,
                subject = excluded.subject,
                difficulty_level = excluded.difficulty_level,
                prerequisites = excluded.prerequisites
            "#,
            params![
                topic.id,
                topic.slug,
                topic.name,
                topic.subject,
                topic.difficulty_level,
                prerequisites,
            ],
        )?;
        Ok(())
    }

    fn topics_by_subject(&self, subject: &str) -> StoreResult<Vec<Topic>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, slug, name, subject, difficulty_level, prerequisites
             FROM topics WHERE subject = ?1 ORDER BY slug ASC",
        )?;
        let rows = stmt.query_map(params![subject], row_to_topic)?;
        let mut topics = Vec::new();
        for row in rows {
            topics.push(row?);
        }
        Ok(topics)
    }

    fn get_mastery(&self, user_id: &str, topic_id: &str) -> StoreResult<Option<MasteryRecord>> {
        let conn = self.get_conn()?;
        Self::query_mastery(&conn, user_id, topic_id)
    }

    fn put_mastery(&self, record: &MasteryRecord) -> StoreResult<()> {
        let conn = self.get_conn()?;
        Self::upsert_mastery(&conn, record)
    }

    fn masteries_for_user(&self, user_id: &str) -> StoreResult<Vec<MasteryRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM topic_mastery WHERE user_id = ?1 ORDER BY topic_id ASC",
            MASTERY_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id], row_to_mastery)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn update_mastery(
        &self,
        user_id: &str,
        topic_id: &str,
        apply: &mut dyn FnMut(Option<MasteryRecord>) -> MasteryRecord,
    ) -> StoreResult<MasteryRecord> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing = Self::query_mastery(&tx, user_id, topic_id)?;
        let updated = apply(existing);
        Self::upsert_mastery(&tx, &updated)?;
        tx.commit()?;

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn mastery(user: &str, topic: &str, attempted: u32, correct: u32) -> MasteryRecord {
        MasteryRecord {
            user_id: user.to_string(),
            topic_id: topic.to_string(),
            attempted,
            correct,
            mastery_level: correct as f64 / attempted as f64,
            consecutive_correct: 0,
            confidence: 0.5,
            last_practiced: Utc::now(),
        }
    }

    #[test]
    fn test_in_memory_mastery_roundtrip() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.put_mastery(&mastery("u1", "t1", 4, 3)).unwrap();

        let loaded = store.get_mastery("u1", "t1").unwrap().unwrap();
        assert_eq!(loaded.attempted, 4);
        assert_eq!(loaded.correct, 3);
        assert!((loaded.mastery_level - 0.75).abs() < 1e-9);
        assert!(store.get_mastery("u1", "t2").unwrap().is_none());
    }

    #[test]
    fn test_update_mastery_inside_transaction() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut seen_existing = Vec::new();
        for _ in 0..3 {
            store
                .update_mastery("u1", "t1", &mut |existing| {
                    seen_existing.push(existing.is_some());
                    let attempted = existing.as_ref().map(|r| r.attempted).unwrap_or(0) + 1;
                    mastery("u1", "t1", attempted, attempted)
                })
                .unwrap();
        }
        assert_eq!(seen_existing, vec![false, true, true]);
        assert_eq!(store.get_mastery("u1", "t1").unwrap().unwrap().attempted, 3);
    }
}
