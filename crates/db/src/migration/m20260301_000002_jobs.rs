//! Durable job queue migration.
//!
//! Creates the jobs table consumed by the worker pool.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(JOBS_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared("DROP TABLE IF EXISTS jobs CASCADE;")
            .await?;
        Ok(())
    }
}

const JOBS_SQL: &str = r"
-- Jobs are never deleted; rows double as the audit trail
CREATE TABLE jobs (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    job_type VARCHAR(50) NOT NULL,
    payload JSONB NOT NULL DEFAULT '{}',
    hotel_id UUID,
    audit_date DATE,
    status VARCHAR(20) NOT NULL DEFAULT 'pending',
    attempts INTEGER NOT NULL DEFAULT 0,
    max_attempts INTEGER NOT NULL DEFAULT 10,
    last_error TEXT,
    available_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    locked_by VARCHAR(100),
    lease_expires_at TIMESTAMPTZ,
    completed_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_job_status CHECK (status IN ('pending', 'processing', 'completed', 'failed')),
    CONSTRAINT chk_job_attempts CHECK (attempts >= 0 AND attempts <= max_attempts),
    CONSTRAINT chk_job_max_attempts CHECK (max_attempts > 0),
    CONSTRAINT chk_job_lease CHECK (status <> 'processing' OR (locked_by IS NOT NULL AND lease_expires_at IS NOT NULL))
);

-- Index for the claim query (oldest due job first)
CREATE INDEX idx_jobs_claimable ON jobs(available_at, created_at)
    WHERE status IN ('pending', 'failed') AND attempts < max_attempts;

-- Index for the lease sweeper
CREATE INDEX idx_jobs_lease ON jobs(lease_expires_at) WHERE status = 'processing';

-- Index for scheduler de-duplication
CREATE INDEX idx_jobs_hotel_date ON jobs(hotel_id, audit_date, job_type);
";
