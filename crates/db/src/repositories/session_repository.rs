use crate::error::DbError;
use crate::models::{SessionRecord, SessionRow};
use sqlx::SqlitePool;
use tracing::{debug, warn};

const SELECT_COLUMNS: &str = "id, question, language, intent, outcome, generated_query, answer, \
     error, retry_count, row_count, trace, started_at, finished_at";

/// Persists finished sessions for later inspection
#[derive(Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace the record for `record.session_id`
    pub async fn record(&self, record: &SessionRecord) -> Result<(), DbError> {
        let row = SessionRow::from_record(record)?;

        sqlx::query(
            r#"
            INSERT INTO sessions (id, question, language, intent, outcome, generated_query, answer,
                                  error, retry_count, row_count, trace, started_at, finished_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                question = excluded.question,
                language = excluded.language,
                intent = excluded.intent,
                outcome = excluded.outcome,
                generated_query = excluded.generated_query,
                answer = excluded.answer,
                error = excluded.error,
                retry_count = excluded.retry_count,
                row_count = excluded.row_count,
                trace = excluded.trace,
                started_at = excluded.started_at,
                finished_at = excluded.finished_at
            "#,
        )
        .bind(&row.id)
        .bind(&row.question)
        .bind(&row.language)
        .bind(&row.intent)
        .bind(&row.outcome)
        .bind(&row.generated_query)
        .bind(&row.answer)
        .bind(&row.error)
        .bind(row.retry_count)
        .bind(row.row_count)
        .bind(&row.trace)
        .bind(row.started_at)
        .bind(row.finished_at)
        .execute(&self.pool)
        .await?;

        debug!(
            session_id = %record.session_id,
            outcome = record.outcome.as_str(),
            "Session recorded"
        );
        Ok(())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<SessionRecord>, DbError> {
        let row: Option<SessionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM sessions WHERE id = ?",
            SELECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_domain()))
    }

    /// Most recent first
    pub async fn find_recent(&self, limit: u32) -> Result<Vec<SessionRecord>, DbError> {
        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM sessions ORDER BY started_at DESC LIMIT ?",
            SELECT_COLUMNS
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }

    pub async fn delete(&self, id: &str) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            warn!(session_id = %id, "Delete requested for unknown session record");
            return Err(DbError::SessionNotFound(id.to_string()));
        }
        debug!(session_id = %id, "Session record deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use chatbi_core::{SessionOutcome, SessionState, StateDelta};

    async fn setup_test_db() -> SqlitePool {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    fn finished(id: &str, outcome: SessionOutcome, delta: StateDelta) -> SessionRecord {
        let mut state = SessionState::new("top products")
            .unwrap()
            .with_session_id(id);
        state.apply(delta).unwrap();
        state.finish(outcome).unwrap();
        SessionRecord::from_state(&state).unwrap()
    }

    #[tokio::test]
    async fn test_record_and_find_session() {
        let repo = SessionRepository::new(setup_test_db().await);
        let record = finished(
            "s-1",
            SessionOutcome::Completed,
            StateDelta::new()
                .with_generated_query("SELECT 1")
                .with_answer("Laptop leads sales"),
        );

        repo.record(&record).await.unwrap();

        let found = repo.find_by_id("s-1").await.unwrap().unwrap();
        assert_eq!(found.outcome, SessionOutcome::Completed);
        assert_eq!(found.generated_query.as_deref(), Some("SELECT 1"));
        assert_eq!(found.answer.as_deref(), Some("Laptop leads sales"));
        assert!(found.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_record_is_upsert() {
        let repo = SessionRepository::new(setup_test_db().await);

        repo.record(&finished("s-1", SessionOutcome::Cancelled, StateDelta::new()))
            .await
            .unwrap();
        repo.record(&finished(
            "s-1",
            SessionOutcome::Failed,
            StateDelta::new().with_error("retry exhausted"),
        ))
        .await
        .unwrap();

        let all = repo.find_recent(10).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].outcome, SessionOutcome::Failed);
        assert_eq!(all[0].error.as_deref(), Some("retry exhausted"));
    }

    #[tokio::test]
    async fn test_find_recent_respects_limit() {
        let repo = SessionRepository::new(setup_test_db().await);
        for i in 0..3 {
            repo.record(&finished(
                &format!("s-{}", i),
                SessionOutcome::EndedEarly,
                StateDelta::new(),
            ))
            .await
            .unwrap();
        }

        assert_eq!(repo.find_recent(2).await.unwrap().len(), 2);
        assert_eq!(repo.find_recent(10).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_find_missing_session() {
        let repo = SessionRepository::new(setup_test_db().await);
        assert!(repo.find_by_id("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_session() {
        let repo = SessionRepository::new(setup_test_db().await);
        repo.record(&finished("s-1", SessionOutcome::Completed, StateDelta::new()))
            .await
            .unwrap();

        repo.delete("s-1").await.unwrap();
        assert!(repo.find_by_id("s-1").await.unwrap().is_none());
        assert!(matches!(
            repo.delete("s-1").await,
            Err(DbError::SessionNotFound(_))
        ));
    }
}
