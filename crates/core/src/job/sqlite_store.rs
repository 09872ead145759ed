//! SQLite-backed job store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;

use super::store::{JobFilter, JobStore, JobStoreError};
use super::types::{ErrorRecord, JobStatus, RenderJob};

const JOB_COLUMNS: &str = "id, status, progress, priority, attempts, cancel_requested, request, \
     outputs, created_at, updated_at, started_at, finished_at, estimated_completion, retry_after";

/// SQLite-backed job store.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Create a new SQLite job store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, JobStoreError> {
        let conn = Connection::open(path).map_err(db)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite job store (useful for testing).
    pub fn in_memory() -> Result<Self, JobStoreError> {
        let conn = Connection::open_in_memory().map_err(db)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), JobStoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS render_jobs (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                progress INTEGER NOT NULL DEFAULT 0,
                priority INTEGER NOT NULL DEFAULT 0,
                attempts INTEGER NOT NULL DEFAULT 0,
                cancel_requested INTEGER NOT NULL DEFAULT 0,
                request TEXT NOT NULL,
                outputs TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                started_at TEXT,
                finished_at TEXT,
                estimated_completion TEXT,
                retry_after TEXT
            );

            CREATE TABLE IF NOT EXISTS job_errors (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id TEXT NOT NULL REFERENCES render_jobs(id) ON DELETE CASCADE,
                record TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_render_jobs_queue ON render_jobs(status, priority, created_at);
            CREATE INDEX IF NOT EXISTS idx_render_jobs_retry ON render_jobs(retry_after);
            CREATE INDEX IF NOT EXISTS idx_job_errors_job ON job_errors(job_id, seq);
            "#,
        )
        .map_err(db)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, JobStoreError> {
        self.conn
            .lock()
            .map_err(|_| JobStoreError::Database("connection lock poisoned".to_string()))
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<RenderJob> {
        let status: String = row.get(1)?;
        let status = status
            .parse::<JobStatus>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, e.into()))?;

        Ok(RenderJob {
            id: row.get(0)?,
            status,
            progress: row.get(2)?,
            priority: row.get(3)?,
            attempts: row.get(4)?,
            cancel_requested: row.get(5)?,
            request: json_column(6, row.get(6)?)?,
            outputs: json_column(7, row.get(7)?)?,
            errors: Vec::new(),
            created_at: time_column(8, row.get(8)?)?,
            updated_at: time_column(9, row.get(9)?)?,
            started_at: optional_time_column(10, row.get(10)?)?,
            finished_at: optional_time_column(11, row.get(11)?)?,
            estimated_completion: optional_time_column(12, row.get(12)?)?,
            retry_after: optional_time_column(13, row.get(13)?)?,
        })
    }

    fn load_errors(conn: &Connection, job_id: &str) -> Result<Vec<ErrorRecord>, JobStoreError> {
        let mut stmt = conn
            .prepare("SELECT record FROM job_errors WHERE job_id = ? ORDER BY seq ASC")
            .map_err(db)?;
        let rows = stmt
            .query_map(params![job_id], |row| row.get::<_, String>(0))
            .map_err(db)?;

        let mut records = Vec::new();
        for row in rows {
            let json = row.map_err(db)?;
            let record = serde_json::from_str(&json)
                .map_err(|e| JobStoreError::Serialization(e.to_string()))?;
            records.push(record);
        }
        Ok(records)
    }

    fn load_job(conn: &Connection, id: &str) -> Result<Option<RenderJob>, JobStoreError> {
        let job = conn
            .query_row(
                &format!("SELECT {} FROM render_jobs WHERE id = ?", JOB_COLUMNS),
                params![id],
                Self::row_to_job,
            )
            .optional()
            .map_err(db)?;

        match job {
            Some(mut job) => {
                job.errors = Self::load_errors(conn, id)?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    fn query_jobs(
        conn: &Connection,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<RenderJob>, JobStoreError> {
        let mut stmt = conn.prepare(sql).map_err(db)?;
        let rows = stmt.query_map(params, Self::row_to_job).map_err(db)?;

        let mut jobs = Vec::new();
        for row in rows {
            let mut job = row.map_err(db)?;
            job.errors = Self::load_errors(conn, &job.id)?;
            jobs.push(job);
        }
        Ok(jobs)
    }
}

impl JobStore for SqliteJobStore {
    fn create(&self, job: &RenderJob) -> Result<(), JobStoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db)?;

        tx.execute(
            &format!(
                "INSERT INTO render_jobs ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                JOB_COLUMNS
            ),
            params![
                job.id,
                job.status.as_str(),
                job.progress,
                job.priority,
                job.attempts,
                job.cancel_requested,
                to_json(&job.request)?,
                to_json(&job.outputs)?,
                ts(&job.created_at),
                ts(&job.updated_at),
                job.started_at.as_ref().map(ts),
                job.finished_at.as_ref().map(ts),
                job.estimated_completion.as_ref().map(ts),
                job.retry_after.as_ref().map(ts),
            ],
        )
        .map_err(db)?;

        for record in &job.errors {
            tx.execute(
                "INSERT INTO job_errors (job_id, record) VALUES (?, ?)",
                params![job.id, to_json(record)?],
            )
            .map_err(db)?;
        }

        tx.commit().map_err(db)
    }

    fn get(&self, id: &str) -> Result<Option<RenderJob>, JobStoreError> {
        let conn = self.lock()?;
        Self::load_job(&conn, id)
    }

    fn list(&self, filter: &JobFilter) -> Result<Vec<RenderJob>, JobStoreError> {
        let conn = self.lock()?;

        match filter.status {
            Some(status) => Self::query_jobs(
                &conn,
                &format!(
                    "SELECT {} FROM render_jobs WHERE status = ? \
                     ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
                    JOB_COLUMNS
                ),
                params![status.as_str(), filter.limit, filter.offset],
            ),
            None => Self::query_jobs(
                &conn,
                &format!(
                    "SELECT {} FROM render_jobs \
                     ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
                    JOB_COLUMNS
                ),
                params![filter.limit, filter.offset],
            ),
        }
    }

    fn count(&self, filter: &JobFilter) -> Result<i64, JobStoreError> {
        let conn = self.lock()?;

        let count = match filter.status {
            Some(status) => conn.query_row(
                "SELECT COUNT(*) FROM render_jobs WHERE status = ?",
                params![status.as_str()],
                |row| row.get(0),
            ),
            None => conn.query_row("SELECT COUNT(*) FROM render_jobs", [], |row| row.get(0)),
        };
        count.map_err(db)
    }

    fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<RenderJob>, JobStoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db)?;

        let job = tx
            .query_row(
                &format!(
                    "SELECT {} FROM render_jobs WHERE status = 'queued' \
                     ORDER BY priority ASC, created_at ASC, rowid ASC LIMIT 1",
                    JOB_COLUMNS
                ),
                [],
                Self::row_to_job,
            )
            .optional()
            .map_err(db)?;

        let Some(mut job) = job else {
            return Ok(None);
        };

        job.status = JobStatus::Processing;
        job.attempts += 1;
        job.started_at = Some(now);
        job.finished_at = None;
        job.updated_at = now;

        tx.execute(
            "UPDATE render_jobs SET status = 'processing', attempts = ?, started_at = ?, \
             finished_at = NULL, updated_at = ? WHERE id = ? AND status = 'queued'",
            params![job.attempts, ts(&now), ts(&now), job.id],
        )
        .map_err(db)?;
        tx.commit().map_err(db)?;

        job.errors = Self::load_errors(&conn, &job.id)?;
        Ok(Some(job))
    }

    fn update(&self, job: &RenderJob, expected: JobStatus) -> Result<RenderJob, JobStoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db)?;

        let actual: Option<String> = tx
            .query_row(
                "SELECT status FROM render_jobs WHERE id = ?",
                params![job.id],
                |row| row.get(0),
            )
            .optional()
            .map_err(db)?;
        let actual = actual
            .ok_or_else(|| JobStoreError::NotFound(job.id.clone()))?
            .parse::<JobStatus>()
            .map_err(JobStoreError::Serialization)?;

        if actual != expected {
            return Err(JobStoreError::StatusConflict {
                id: job.id.clone(),
                expected,
                actual,
            });
        }
        if !actual.can_transition_to(job.status) {
            return Err(JobStoreError::InvalidTransition {
                id: job.id.clone(),
                from: actual,
                to: job.status,
            });
        }

        // Progress only moves forward, except when a retry starts a new run.
        let progress_expr = if actual.is_terminal() && job.status == JobStatus::Queued {
            "?"
        } else {
            "MAX(progress, ?)"
        };

        tx.execute(
            &format!(
                "UPDATE render_jobs SET status = ?, progress = {}, priority = ?, attempts = ?, \
                 cancel_requested = ?, outputs = ?, updated_at = ?, started_at = ?, \
                 finished_at = ?, estimated_completion = ?, retry_after = ? WHERE id = ?",
                progress_expr
            ),
            params![
                job.status.as_str(),
                job.progress,
                job.priority,
                job.attempts,
                job.cancel_requested,
                to_json(&job.outputs)?,
                ts(&Utc::now()),
                job.started_at.as_ref().map(ts),
                job.finished_at.as_ref().map(ts),
                job.estimated_completion.as_ref().map(ts),
                job.retry_after.as_ref().map(ts),
                job.id,
            ],
        )
        .map_err(db)?;
        tx.commit().map_err(db)?;

        Self::load_job(&conn, &job.id)?.ok_or_else(|| JobStoreError::NotFound(job.id.clone()))
    }

    fn update_progress(
        &self,
        id: &str,
        progress: u8,
        estimated_completion: Option<DateTime<Utc>>,
    ) -> Result<u8, JobStoreError> {
        let conn = self.lock()?;

        conn.execute(
            "UPDATE render_jobs SET progress = MAX(progress, ?), \
             estimated_completion = COALESCE(?, estimated_completion), updated_at = ? \
             WHERE id = ? AND status = 'processing'",
            params![
                progress.min(100),
                estimated_completion.as_ref().map(ts),
                ts(&Utc::now()),
                id
            ],
        )
        .map_err(db)?;

        conn.query_row(
            "SELECT progress FROM render_jobs WHERE id = ?",
            params![id],
            |row| row.get(0),
        )
        .optional()
        .map_err(db)?
        .ok_or_else(|| JobStoreError::NotFound(id.to_string()))
    }

    fn append_error(&self, id: &str, record: &ErrorRecord) -> Result<(), JobStoreError> {
        let conn = self.lock()?;

        let inserted = conn
            .execute(
                "INSERT INTO job_errors (job_id, record) \
                 SELECT id, ? FROM render_jobs WHERE id = ?",
                params![to_json(record)?, id],
            )
            .map_err(db)?;

        if inserted == 0 {
            return Err(JobStoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn due_retries(&self, now: DateTime<Utc>) -> Result<Vec<RenderJob>, JobStoreError> {
        let conn = self.lock()?;
        Self::query_jobs(
            &conn,
            &format!(
                "SELECT {} FROM render_jobs \
                 WHERE status IN ('failed', 'partially_completed') \
                 AND retry_after IS NOT NULL AND retry_after <= ? \
                 ORDER BY priority ASC, retry_after ASC",
                JOB_COLUMNS
            ),
            params![ts(&now)],
        )
    }

    fn delete(&self, id: &str) -> Result<RenderJob, JobStoreError> {
        let mut conn = self.lock()?;
        let job = Self::load_job(&conn, id)?.ok_or_else(|| JobStoreError::NotFound(id.to_string()))?;

        let tx = conn.transaction().map_err(db)?;
        tx.execute("DELETE FROM job_errors WHERE job_id = ?", params![id])
            .map_err(db)?;
        tx.execute("DELETE FROM render_jobs WHERE id = ?", params![id])
            .map_err(db)?;
        tx.commit().map_err(db)?;

        Ok(job)
    }
}

fn db(e: rusqlite::Error) -> JobStoreError {
    JobStoreError::Database(e.to_string())
}

/// Fixed-width UTC timestamps so text comparison matches time order.
fn ts(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JobStoreError> {
    serde_json::to_string(value).map_err(|e| JobStoreError::Serialization(e.to_string()))
}

fn json_column<T: DeserializeOwned>(idx: usize, raw: String) -> rusqlite::Result<T> {
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn time_column(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn optional_time_column(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|r| time_column(idx, r)).transpose()
}
