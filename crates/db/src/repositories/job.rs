//! Job repository: the durable queue behind the retry orchestrator.
//!
//! Claims are a single conditional `UPDATE`; whoever sees
//! `rows_affected == 1` owns the job. Completion, failure and release are
//! checked against `status = 'processing' AND locked_by = <worker>`.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use sea_orm::sea_query::{Expr, LockBehavior, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::{debug, info, instrument, warn};

use innkeep_core::jobs::{
    FailureOutcome, JobError, JobPayload, JobRecord, JobStatus, JobType, RetryPolicy,
};
use innkeep_shared::types::{HotelId, JobId};

use crate::entities::jobs;

/// Job repository.
#[derive(Debug, Clone)]
pub struct JobRepository {
    db: DatabaseConnection,
}

impl JobRepository {
    /// Creates a new job repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Enqueues a pending job, claimable immediately.
    #[instrument(skip(self, payload), fields(job_type = %payload.job_type()))]
    pub async fn enqueue(
        &self,
        payload: &JobPayload,
        max_attempts: i32,
    ) -> Result<JobRecord, JobError> {
        let record = JobRecord::new(payload.job_type(), payload.encode()?, max_attempts, Utc::now());
        let (hotel_id, audit_date) = match payload {
            JobPayload::NightAudit(p) => (p.hotel_id, p.audit_date),
            JobPayload::DailyReport(p) => (p.hotel_id, p.audit_date),
        };

        jobs::ActiveModel {
            id: Set(record.id.into_inner()),
            job_type: Set(record.job_type.clone()),
            payload: Set(record.payload.clone()),
            hotel_id: Set(Some(hotel_id.into_inner())),
            audit_date: Set(Some(audit_date)),
            status: Set(record.status.as_str().to_string()),
            attempts: Set(record.attempts),
            max_attempts: Set(record.max_attempts),
            last_error: Set(None),
            available_at: Set(record.available_at.into()),
            locked_by: Set(None),
            lease_expires_at: Set(None),
            completed_at: Set(None),
            created_at: Set(record.created_at.into()),
            updated_at: Set(record.updated_at.into()),
        }
        .insert(&self.db)
        .await
        .map_err(database_error)?;

        info!(job_id = %record.id, "Job enqueued");
        Ok(record)
    }

    /// Loads a job.
    pub async fn get(&self, job_id: JobId) -> Result<JobRecord, JobError> {
        jobs::Entity::find_by_id(job_id.into_inner())
            .one(&self.db)
            .await
            .map_err(database_error)?
            .ok_or(JobError::NotFound(job_id))
            .and_then(to_record)
    }

    /// Claims the oldest due job, if any.
    pub async fn claim_next(
        &self,
        worker_id: &str,
        lease: Duration,
    ) -> Result<Option<JobRecord>, JobError> {
        let now = Utc::now();
        let txn = self.db.begin().await.map_err(database_error)?;

        let candidate = jobs::Entity::find()
            .filter(claimable(now))
            .order_by_asc(jobs::Column::AvailableAt)
            .order_by_asc(jobs::Column::CreatedAt)
            .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
            .one(&txn)
            .await
            .map_err(database_error)?;

        let Some(candidate) = candidate else {
            return Ok(None);
        };
        let job_id = JobId::from_uuid(candidate.id);
        let won = claim_update(&txn, job_id, worker_id, lease, now).await?;
        txn.commit().await.map_err(database_error)?;

        if !won {
            return Ok(None);
        }
        debug!(job_id = %job_id, worker_id, "Job claimed");
        self.get(job_id).await.map(Some)
    }

    /// Claims one specific job.
    ///
    /// # Errors
    ///
    /// Returns `NotClaimable` if the claim predicate does not match, which
    /// includes a job that reached its attempts cap.
    #[instrument(skip(self, lease), fields(job_id = %job_id))]
    pub async fn claim_by_id(
        &self,
        job_id: JobId,
        worker_id: &str,
        lease: Duration,
    ) -> Result<JobRecord, JobError> {
        let now = Utc::now();
        if claim_update(&self.db, job_id, worker_id, lease, now).await? {
            debug!(worker_id, "Job claimed");
            return self.get(job_id).await;
        }
        let job = self.get(job_id).await?;
        Err(JobError::NotClaimable {
            job_id,
            status: job.status,
            attempts: job.attempts,
            max_attempts: job.max_attempts,
        })
    }

    /// `processing → completed`.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn complete(&self, job_id: JobId, worker_id: &str) -> Result<JobRecord, JobError> {
        let now = Utc::now();
        let result = jobs::Entity::update_many()
            .col_expr(jobs::Column::Status, Expr::value(JobStatus::Completed.as_str()))
            .col_expr(jobs::Column::CompletedAt, Expr::value(now))
            .col_expr(jobs::Column::LockedBy, Expr::value(Option::<String>::None))
            .col_expr(
                jobs::Column::LeaseExpiresAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .col_expr(jobs::Column::UpdatedAt, Expr::value(now))
            .filter(held_by(job_id, worker_id))
            .exec(&self.db)
            .await
            .map_err(database_error)?;

        if result.rows_affected != 1 {
            return Err(JobError::NotLockedBy {
                job_id,
                worker_id: worker_id.to_string(),
            });
        }
        info!("Job completed");
        self.get(job_id).await
    }

    /// `processing → failed`, counting an attempt and scheduling the retry.
    #[instrument(skip(self, error, policy), fields(job_id = %job_id))]
    pub async fn fail(
        &self,
        job_id: JobId,
        worker_id: &str,
        error: &str,
        retryable: bool,
        policy: &RetryPolicy,
    ) -> Result<(JobRecord, FailureOutcome), JobError> {
        let now = Utc::now();
        let txn = self.db.begin().await.map_err(database_error)?;
        let mut record = jobs::Entity::find_by_id(job_id.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(database_error)?
            .ok_or(JobError::NotFound(job_id))
            .and_then(to_record)?;

        let outcome = record.fail(worker_id, error, retryable, policy, now)?;

        let result = jobs::Entity::update_many()
            .col_expr(jobs::Column::Status, Expr::value(record.status.as_str()))
            .col_expr(jobs::Column::Attempts, Expr::value(record.attempts))
            .col_expr(jobs::Column::LastError, Expr::value(record.last_error.clone()))
            .col_expr(jobs::Column::AvailableAt, Expr::value(record.available_at))
            .col_expr(jobs::Column::LockedBy, Expr::value(Option::<String>::None))
            .col_expr(
                jobs::Column::LeaseExpiresAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .col_expr(jobs::Column::UpdatedAt, Expr::value(now))
            .filter(held_by(job_id, worker_id))
            .exec(&txn)
            .await
            .map_err(database_error)?;
        if result.rows_affected != 1 {
            return Err(JobError::NotLockedBy {
                job_id,
                worker_id: worker_id.to_string(),
            });
        }
        txn.commit().await.map_err(database_error)?;

        match outcome {
            FailureOutcome::RetryScheduled { attempts, available_at } => {
                warn!(attempts, %available_at, error, "Job failed, retry scheduled");
            }
            FailureOutcome::Exhausted { attempts } => {
                warn!(attempts, error, "Job failed permanently");
            }
        }
        Ok((record, outcome))
    }

    /// Pushes the lease of a running job out to `now + lease`.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn renew_lease(
        &self,
        job_id: JobId,
        worker_id: &str,
        lease: Duration,
    ) -> Result<JobRecord, JobError> {
        let now = Utc::now();
        let result = jobs::Entity::update_many()
            .col_expr(jobs::Column::LeaseExpiresAt, Expr::value(now + lease))
            .col_expr(jobs::Column::UpdatedAt, Expr::value(now))
            .filter(held_by(job_id, worker_id))
            .exec(&self.db)
            .await
            .map_err(database_error)?;
        if result.rows_affected != 1 {
            return Err(JobError::NotLockedBy {
                job_id,
                worker_id: worker_id.to_string(),
            });
        }
        debug!("Job lease renewed");
        self.get(job_id).await
    }

    /// `processing → pending` without counting an attempt.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn release(&self, job_id: JobId, worker_id: &str) -> Result<JobRecord, JobError> {
        let now = Utc::now();
        let result = release_query(now)
            .filter(held_by(job_id, worker_id))
            .exec(&self.db)
            .await
            .map_err(database_error)?;
        if result.rows_affected != 1 {
            return Err(JobError::NotLockedBy {
                job_id,
                worker_id: worker_id.to_string(),
            });
        }
        info!("Job released");
        self.get(job_id).await
    }

    /// Returns every `processing` job whose lease ran out to `pending`.
    pub async fn sweep_expired(&self) -> Result<u64, JobError> {
        let now = Utc::now();
        let result = release_query(now)
            .filter(jobs::Column::Status.eq(JobStatus::Processing.as_str()))
            .filter(jobs::Column::LeaseExpiresAt.lte(now))
            .exec(&self.db)
            .await
            .map_err(database_error)?;
        if result.rows_affected > 0 {
            warn!(released = result.rows_affected, "Expired job leases released");
        }
        Ok(result.rows_affected)
    }

    /// A job of `job_type` for the hotel and date that may still run.
    pub async fn find_active(
        &self,
        job_type: JobType,
        hotel_id: HotelId,
        audit_date: NaiveDate,
    ) -> Result<Option<JobRecord>, JobError> {
        jobs::Entity::find()
            .filter(jobs::Column::JobType.eq(job_type.as_str()))
            .filter(jobs::Column::HotelId.eq(hotel_id.into_inner()))
            .filter(jobs::Column::AuditDate.eq(audit_date))
            .filter(
                Condition::any()
                    .add(jobs::Column::Status.is_in([
                        JobStatus::Pending.as_str(),
                        JobStatus::Processing.as_str(),
                    ]))
                    .add(
                        Condition::all()
                            .add(jobs::Column::Status.eq(JobStatus::Failed.as_str()))
                            .add(Expr::col(jobs::Column::Attempts).lt(Expr::col(jobs::Column::MaxAttempts))),
                    ),
            )
            .order_by_desc(jobs::Column::CreatedAt)
            .one(&self.db)
            .await
            .map_err(database_error)?
            .map(to_record)
            .transpose()
    }

    /// The most recent job of `job_type` for the hotel and date, in any status.
    pub async fn find_latest(
        &self,
        job_type: JobType,
        hotel_id: HotelId,
        audit_date: NaiveDate,
    ) -> Result<Option<JobRecord>, JobError> {
        jobs::Entity::find()
            .filter(jobs::Column::JobType.eq(job_type.as_str()))
            .filter(jobs::Column::HotelId.eq(hotel_id.into_inner()))
            .filter(jobs::Column::AuditDate.eq(audit_date))
            .order_by_desc(jobs::Column::CreatedAt)
            .one(&self.db)
            .await
            .map_err(database_error)?
            .map(to_record)
            .transpose()
    }
}

fn claimable(now: DateTime<Utc>) -> Condition {
    Condition::all()
        .add(jobs::Column::Status.is_in([JobStatus::Pending.as_str(), JobStatus::Failed.as_str()]))
        .add(Expr::col(jobs::Column::Attempts).lt(Expr::col(jobs::Column::MaxAttempts)))
        .add(jobs::Column::AvailableAt.lte(now))
}

fn held_by(job_id: JobId, worker_id: &str) -> Condition {
    Condition::all()
        .add(jobs::Column::Id.eq(job_id.into_inner()))
        .add(jobs::Column::Status.eq(JobStatus::Processing.as_str()))
        .add(jobs::Column::LockedBy.eq(worker_id))
}

async fn claim_update<C: sea_orm::ConnectionTrait>(
    conn: &C,
    job_id: JobId,
    worker_id: &str,
    lease: Duration,
    now: DateTime<Utc>,
) -> Result<bool, JobError> {
    let result = jobs::Entity::update_many()
        .col_expr(jobs::Column::Status, Expr::value(JobStatus::Processing.as_str()))
        .col_expr(jobs::Column::LockedBy, Expr::value(worker_id))
        .col_expr(jobs::Column::LeaseExpiresAt, Expr::value(now + lease))
        .col_expr(jobs::Column::UpdatedAt, Expr::value(now))
        .filter(jobs::Column::Id.eq(job_id.into_inner()))
        .filter(claimable(now))
        .exec(conn)
        .await
        .map_err(database_error)?;
    Ok(result.rows_affected == 1)
}

fn release_query(now: DateTime<Utc>) -> sea_orm::UpdateMany<jobs::Entity> {
    jobs::Entity::update_many()
        .col_expr(jobs::Column::Status, Expr::value(JobStatus::Pending.as_str()))
        .col_expr(jobs::Column::LockedBy, Expr::value(Option::<String>::None))
        .col_expr(
            jobs::Column::LeaseExpiresAt,
            Expr::value(Option::<DateTime<Utc>>::None),
        )
        .col_expr(jobs::Column::AvailableAt, Expr::value(now))
        .col_expr(jobs::Column::UpdatedAt, Expr::value(now))
}

fn to_record(model: jobs::Model) -> Result<JobRecord, JobError> {
    Ok(JobRecord {
        id: JobId::from_uuid(model.id),
        job_type: model.job_type,
        payload: model.payload,
        status: model.status.parse()?,
        attempts: model.attempts,
        max_attempts: model.max_attempts,
        last_error: model.last_error,
        available_at: model.available_at.with_timezone(&Utc),
        locked_by: model.locked_by,
        lease_expires_at: model.lease_expires_at.map(|t| t.with_timezone(&Utc)),
        completed_at: model.completed_at.map(|t| t.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn database_error(err: DbErr) -> JobError {
    JobError::Database(err.to_string())
}
