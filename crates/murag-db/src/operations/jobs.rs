//! Pipeline job queue operations.

use super::{parse_datetime, parse_optional_datetime};
use crate::database::Database;
use crate::error::{DbError, DbResult};
use chrono::{DateTime, Utc};
use murag_core::{Job, JobKind, JobStatus};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

const JOB_COLUMNS: &str = "id, document_id, kind, status, attempts, max_attempts, error, \
     created_at, next_attempt_at, started_at, completed_at";

/// Number of jobs in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobCounts {
    pub pending: i64,
    pub processing: i64,
    pub done: i64,
    pub failed: i64,
}

impl Database {
    /// Add a job to the queue.
    ///
    /// Returns false if the document already has an in-flight job of the same kind.
    pub fn enqueue_job(&self, job: &Job) -> DbResult<bool> {
        let conn = self.conn()?;
        Ok(insert_job(&conn, job)?)
    }

    /// Get a job by ID.
    pub fn get_job(&self, id: &str) -> DbResult<Job> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM jobs WHERE id = ?1", JOB_COLUMNS),
            params![id],
            row_to_job,
        )
        .optional()?
        .ok_or_else(|| DbError::NotFound(format!("Job not found: {}", id)))
    }

    /// Claim the oldest pending job that is due.
    ///
    /// The claim is a single `UPDATE ... RETURNING`, so concurrent workers
    /// never receive the same job.
    pub fn dequeue_job(&self, now: DateTime<Utc>) -> DbResult<Option<Job>> {
        let conn = self.conn()?;
        let now = now.to_rfc3339();

        let job = conn
            .query_row(
                &format!(
                    r#"
                    UPDATE jobs
                    SET status = 'processing', started_at = ?1, attempts = attempts + 1
                    WHERE id = (
                        SELECT id FROM jobs
                        WHERE status = 'pending' AND next_attempt_at <= ?1
                        ORDER BY next_attempt_at ASC, created_at ASC
                        LIMIT 1
                    )
                    RETURNING {}
                    "#,
                    JOB_COLUMNS
                ),
                params![now],
                row_to_job,
            )
            .optional()?;

        Ok(job)
    }

    /// Mark a job as completed.
    pub fn complete_job(&self, id: &str) -> DbResult<()> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE jobs SET status = 'done', error = NULL, completed_at = ?2 WHERE id = ?1",
            params![id, Utc::now().to_rfc3339()],
        )?;

        if rows == 0 {
            return Err(DbError::NotFound(format!("Job not found: {}", id)));
        }
        Ok(())
    }

    /// Put a failed job back in the queue, due at `next_attempt_at`.
    pub fn reschedule_job(
        &self,
        id: &str,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> DbResult<()> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE jobs SET status = 'pending', error = ?2, next_attempt_at = ?3, started_at = NULL
             WHERE id = ?1",
            params![id, error, next_attempt_at.to_rfc3339()],
        )?;

        if rows == 0 {
            return Err(DbError::NotFound(format!("Job not found: {}", id)));
        }
        Ok(())
    }

    /// Mark a job as permanently failed.
    pub fn fail_job(&self, id: &str, error: &str) -> DbResult<()> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE jobs SET status = 'failed', error = ?2, completed_at = ?3 WHERE id = ?1",
            params![id, error, Utc::now().to_rfc3339()],
        )?;

        if rows == 0 {
            return Err(DbError::NotFound(format!("Job not found: {}", id)));
        }
        Ok(())
    }

    /// Return jobs claimed at or before `claimed_before` to the queue.
    ///
    /// Jobs claimed later are assumed to belong to a live worker and are left alone.
    pub fn recover_stale_jobs(&self, claimed_before: DateTime<Utc>) -> DbResult<i64> {
        let conn = self.conn()?;
        let count = conn.execute(
            "UPDATE jobs SET status = 'pending', started_at = NULL, next_attempt_at = ?1
             WHERE status = 'processing' AND started_at <= ?2",
            params![Utc::now().to_rfc3339(), claimed_before.to_rfc3339()],
        )?;
        Ok(count as i64)
    }

    /// List jobs, most recent first.
    pub fn list_jobs(&self, status: Option<JobStatus>, limit: Option<i64>) -> DbResult<Vec<Job>> {
        let conn = self.conn()?;
        let limit = limit.unwrap_or(100);

        let jobs = match status {
            Some(s) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM jobs WHERE status = ?1 ORDER BY created_at DESC LIMIT ?2",
                    JOB_COLUMNS
                ))?;
                let rows = stmt.query_map(params![s.as_str(), limit], row_to_job)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM jobs ORDER BY created_at DESC LIMIT ?1",
                    JOB_COLUMNS
                ))?;
                let rows = stmt.query_map(params![limit], row_to_job)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };

        Ok(jobs)
    }

    /// Get job counts by status.
    pub fn job_counts(&self) -> DbResult<JobCounts> {
        let conn = self.conn()?;
        job_counts(&conn)
    }
}

pub(crate) fn job_counts(conn: &Connection) -> DbResult<JobCounts> {
    let mut counts = JobCounts::default();
    let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM jobs GROUP BY status")?;
    let rows = stmt.query_map([], |row| {
        let status: String = row.get(0)?;
        let count: i64 = row.get(1)?;
        Ok((status, count))
    })?;

    for row in rows {
        let (status, count) = row?;
        match JobStatus::from_str(&status) {
            Some(JobStatus::Pending) => counts.pending = count,
            Some(JobStatus::Processing) => counts.processing = count,
            Some(JobStatus::Done) => counts.done = count,
            Some(JobStatus::Failed) => counts.failed = count,
            None => {}
        }
    }

    Ok(counts)
}

/// Insert a job unless an equivalent one is already in flight.
pub(crate) fn insert_job(conn: &Connection, job: &Job) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        r#"
        INSERT OR IGNORE INTO jobs (id, document_id, kind, status, attempts, max_attempts, error,
                                    created_at, next_attempt_at, started_at, completed_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
        params![
            job.id,
            job.document_id,
            job.kind.as_str(),
            job.status.as_str(),
            job.attempts,
            job.max_attempts,
            job.error,
            job.created_at.to_rfc3339(),
            job.next_attempt_at.to_rfc3339(),
            job.started_at.map(|dt| dt.to_rfc3339()),
            job.completed_at.map(|dt| dt.to_rfc3339()),
        ],
    )?;
    Ok(rows == 1)
}

fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
    let kind_str: String = row.get(2)?;
    let status_str: String = row.get(3)?;
    let created_at_str: String = row.get(7)?;
    let next_attempt_str: String = row.get(8)?;

    let kind = JobKind::from_str(&kind_str).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(2, kind_str.clone(), rusqlite::types::Type::Text)
    })?;

    Ok(Job {
        id: row.get(0)?,
        document_id: row.get(1)?,
        kind,
        status: JobStatus::from_str(&status_str).unwrap_or_default(),
        attempts: row.get(4)?,
        max_attempts: row.get(5)?,
        error: row.get(6)?,
        created_at: parse_datetime(&created_at_str),
        next_attempt_at: parse_datetime(&next_attempt_str),
        started_at: parse_optional_datetime(row.get(9)?),
        completed_at: parse_optional_datetime(row.get(10)?),
    })
}
