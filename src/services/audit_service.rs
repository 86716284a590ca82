use crate::error::Result;
use crate::models::audit_log::{AuditLog, NewAuditEntry};
use sqlx::{PgExecutor, PgPool};

/// Appends an audit entry on any executor, so workflow writes can share their transaction.
pub async fn record<'e, E>(executor: E, entry: &NewAuditEntry) -> Result<AuditLog>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, AuditLog>(
        r#"
        INSERT INTO audit_logs (log_name, description, subject_type, subject_id, causer_id, event, properties)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(&entry.log_name)
    .bind(&entry.description)
    .bind(&entry.subject_type)
    .bind(entry.subject_id)
    .bind(entry.causer_id)
    .bind(&entry.event)
    .bind(&entry.properties)
    .fetch_one(executor)
    .await?;

    tracing::debug!(
        event = %row.event,
        subject_type = %row.subject_type,
        subject_id = row.subject_id,
        "audit entry recorded"
    );
    Ok(row)
}

#[derive(Clone)]
pub struct AuditService {
    pool: PgPool,
}

impl AuditService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn for_subject(&self, subject_type: &str, subject_id: i64) -> Result<Vec<AuditLog>> {
        let rows = sqlx::query_as::<_, AuditLog>(
            r#"
            SELECT * FROM audit_logs
            WHERE subject_type = $1 AND subject_id = $2
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(subject_type)
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
