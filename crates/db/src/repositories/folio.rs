//! Folio repository: the atomic storage units of the folio ledger.
//!
//! Every posting, void and repair runs inside one database transaction that
//! locks the folio row (`SELECT ... FOR UPDATE`), reads the balance, appends
//! ledger rows, writes the new balance and applies the status hook. The
//! per-hotel sequence row is locked the same way to issue transaction
//! numbers.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use innkeep_core::folio::{
    FolioService, FolioSnapshot, FolioStatus, FolioWorkflowStatus, LedgerEntry, LedgerError,
    PostingInput, StatusChange, TransactionCategory, TransactionStatus, VoidTarget,
};
use innkeep_core::tax::TaxGraph;
use innkeep_shared::types::{
    CompanyId, FolioId, FolioTransactionId, GuestId, HotelId, ReservationId, ReservationRoomId,
    TaxRateId, UserId,
};

use super::tax_rate::{TaxRateError, TaxRateRepository};
use crate::entities::{
    folio_transaction_taxes, folio_transactions, folios, hotel_transaction_sequences, hotels,
};

/// Name of the partial unique index backing night audit idempotence.
pub const ROOM_CHARGE_INDEX: &str = "uq_room_charge_per_night";

/// Input for opening a folio.
#[derive(Debug, Clone, Default)]
pub struct CreateFolioInput {
    /// Owning hotel.
    pub hotel_id: HotelId,
    /// Guest billed on this folio.
    pub guest_id: Option<GuestId>,
    /// Reservation billed on this folio.
    pub reservation_id: Option<ReservationId>,
    /// Company (city ledger) billed on this folio.
    pub company_id: Option<CompanyId>,
    /// Folio currency; defaults to the hotel's.
    pub currency: Option<String>,
}

/// A posted transaction with its tax lines and the folio after posting.
#[derive(Debug, Clone)]
pub struct PostingResult {
    /// The appended ledger row.
    pub transaction: folio_transactions::Model,
    /// Tax lines in dependency order.
    pub tax_lines: Vec<folio_transaction_taxes::Model>,
    /// Folio after the balance update and status hook.
    pub folio: folios::Model,
    /// Status transition applied by the hook.
    pub status_change: Option<StatusChange>,
}

/// A voided transaction and its balancing entry.
#[derive(Debug, Clone)]
pub struct VoidResult {
    /// The original, now `voided`.
    pub original: folio_transactions::Model,
    /// The `void`-category balancing entry.
    pub balancing_entry: folio_transactions::Model,
    /// Folio after the balance update and status hook.
    pub folio: folios::Model,
    /// Status transition applied by the hook.
    pub status_change: Option<StatusChange>,
}

/// Outcome of `recalculate_folio_totals`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecalculationResult {
    /// The folio.
    pub folio_id: FolioId,
    /// Balance before the replay.
    pub stored_balance: Decimal,
    /// Balance from the full replay.
    pub replayed_balance: Decimal,
    /// `replayed - stored`.
    pub drift: Decimal,
    /// True if the stored balance was rewritten.
    pub repaired: bool,
    /// Status transition applied by the hook.
    pub status_change: Option<StatusChange>,
}

/// Outcome of posting one audited night for a reservation room.
#[derive(Debug, Clone)]
pub enum RoomNightOutcome {
    /// Postings written in this call.
    Posted(Vec<PostingResult>),
    /// A room charge for that night already existed; nothing written.
    AlreadyPosted,
}

/// Folio repository for ledger operations.
#[derive(Debug, Clone)]
pub struct FolioRepository {
    db: DatabaseConnection,
    taxes: TaxRateRepository,
}

impl FolioRepository {
    /// Creates a new folio repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, taxes: TaxRateRepository) -> Self {
        Self { db, taxes }
    }

    /// Opens a folio with status `open`, workflow `active` and balance 0.
    ///
    /// # Errors
    ///
    /// Returns `HotelNotFound` if the hotel does not exist.
    #[instrument(skip(self, input), fields(hotel_id = %input.hotel_id))]
    pub async fn create_folio(&self, input: CreateFolioInput) -> Result<folios::Model, LedgerError> {
        let hotel = hotels::Entity::find_by_id(input.hotel_id.into_inner())
            .one(&self.db)
            .await
            .map_err(database_error)?
            .ok_or(LedgerError::HotelNotFound(input.hotel_id))?;

        let id = FolioId::new();
        let now = Utc::now().into();
        let folio = folios::ActiveModel {
            id: Set(id.into_inner()),
            hotel_id: Set(hotel.id),
            folio_number: Set(folio_number(id)),
            guest_id: Set(input.guest_id.map(GuestId::into_inner)),
            reservation_id: Set(input.reservation_id.map(ReservationId::into_inner)),
            company_id: Set(input.company_id.map(CompanyId::into_inner)),
            status: Set(FolioStatus::Open.as_str().to_string()),
            workflow_status: Set(FolioWorkflowStatus::Active.as_str().to_string()),
            balance: Set(Decimal::ZERO),
            currency: Set(input.currency.unwrap_or(hotel.currency)),
            print_count: Set(0),
            closed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
        .map_err(database_error)?;

        info!(folio_id = %folio.id, folio_number = %folio.folio_number, "Folio opened");
        Ok(folio)
    }

    /// Finds a folio by ID.
    ///
    /// # Errors
    ///
    /// Returns `Database` if the query fails.
    pub async fn find_folio(&self, folio_id: FolioId) -> Result<Option<folios::Model>, LedgerError> {
        folios::Entity::find_by_id(folio_id.into_inner())
            .one(&self.db)
            .await
            .map_err(database_error)
    }

    /// Lists a folio's transactions in `transaction_number` order.
    ///
    /// # Errors
    ///
    /// Returns `Database` if the query fails.
    pub async fn list_transactions(
        &self,
        folio_id: FolioId,
    ) -> Result<Vec<folio_transactions::Model>, LedgerError> {
        folio_transactions::Entity::find()
            .filter(folio_transactions::Column::FolioId.eq(folio_id.into_inner()))
            .order_by_asc(folio_transactions::Column::TransactionNumber)
            .all(&self.db)
            .await
            .map_err(database_error)
    }

    /// Lists the tax lines of a transaction in dependency order.
    ///
    /// # Errors
    ///
    /// Returns `Database` if the query fails.
    pub async fn list_tax_lines(
        &self,
        transaction_id: FolioTransactionId,
    ) -> Result<Vec<folio_transaction_taxes::Model>, LedgerError> {
        folio_transaction_taxes::Entity::find()
            .filter(
                folio_transaction_taxes::Column::FolioTransactionId.eq(transaction_id.into_inner()),
            )
            .order_by_asc(folio_transaction_taxes::Column::LineOrder)
            .all(&self.db)
            .await
            .map_err(database_error)
    }

    /// Posts one transaction in its own atomic unit.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` on validation failure, a missing folio, an
    /// invalid tax configuration or a storage failure. Nothing is written on
    /// error.
    #[instrument(skip(self, input), fields(folio_id = %input.folio_id, category = %input.category))]
    pub async fn post_transaction(&self, input: &PostingInput) -> Result<PostingResult, LedgerError> {
        let folio = self
            .find_folio(input.folio_id)
            .await?
            .ok_or(LedgerError::FolioNotFound(input.folio_id))?;
        let graph = self.tax_graph(HotelId::from_uuid(folio.hotel_id)).await?;

        let txn = self.db.begin().await.map_err(database_error)?;
        let result = self.post_in(&txn, input, &graph).await?;
        txn.commit().await.map_err(database_error)?;

        info!(
            transaction_id = %result.transaction.id,
            transaction_number = result.transaction.transaction_number,
            gross = %result.transaction.gross_amount,
            balance = %result.folio.balance,
            status = %result.folio.status,
            "Transaction posted"
        );
        Ok(result)
    }

    /// Posts the charges of one audited night, unless a room charge for
    /// `(reservation_room_id, working_date)` already exists.
    ///
    /// The existence check and all postings share one atomic unit. A unique
    /// violation on the room charge index is reported as already posted.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` if a posting fails; nothing is written then.
    #[instrument(skip(self, postings), fields(reservation_room_id = %reservation_room_id, %working_date))]
    pub async fn post_room_night(
        &self,
        hotel_id: HotelId,
        reservation_room_id: ReservationRoomId,
        working_date: chrono::NaiveDate,
        postings: &[PostingInput],
    ) -> Result<RoomNightOutcome, LedgerError> {
        let graph = self.tax_graph(hotel_id).await?;
        let txn = self.db.begin().await.map_err(database_error)?;

        let existing = folio_transactions::Entity::find()
            .filter(folio_transactions::Column::HotelId.eq(hotel_id.into_inner()))
            .filter(
                folio_transactions::Column::ReservationRoomId.eq(reservation_room_id.into_inner()),
            )
            .filter(folio_transactions::Column::CurrentWorkingDate.eq(working_date))
            .filter(folio_transactions::Column::Category.eq(TransactionCategory::Room.as_str()))
            .filter(folio_transactions::Column::IsBalancingEntry.eq(false))
            .one(&txn)
            .await
            .map_err(database_error)?;
        if existing.is_some() {
            return Ok(RoomNightOutcome::AlreadyPosted);
        }

        let mut results = Vec::with_capacity(postings.len());
        for input in postings {
            match self.post_in(&txn, input, &graph).await {
                Ok(result) => results.push(result),
                Err(LedgerError::AlreadyPosted { .. }) => return Ok(RoomNightOutcome::AlreadyPosted),
                Err(e) => return Err(e),
            }
        }

        match txn.commit().await {
            Ok(()) => Ok(RoomNightOutcome::Posted(results)),
            Err(e) if is_room_charge_conflict(&e) => Ok(RoomNightOutcome::AlreadyPosted),
            Err(e) => Err(database_error(e)),
        }
    }

    /// Voids a posted transaction by stamping it `voided` and appending a
    /// balancing entry carrying its negated gross.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` if the reason is empty, the transaction is
    /// missing, already voided, a balancing entry or not posted, or storage
    /// fails.
    #[instrument(skip(self, reason), fields(transaction_id = %transaction_id))]
    pub async fn void_transaction(
        &self,
        transaction_id: FolioTransactionId,
        reason: &str,
        voided_by: Option<UserId>,
    ) -> Result<VoidResult, LedgerError> {
        let txn = self.db.begin().await.map_err(database_error)?;

        let folio_id = folio_transactions::Entity::find_by_id(transaction_id.into_inner())
            .one(&txn)
            .await
            .map_err(database_error)?
            .ok_or(LedgerError::TransactionNotFound(transaction_id))?
            .folio_id;

        let folio = lock_folio(&txn, FolioId::from_uuid(folio_id)).await?;
        let original = folio_transactions::Entity::find_by_id(transaction_id.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(database_error)?
            .ok_or(LedgerError::TransactionNotFound(transaction_id))?;

        let snapshot = snapshot(&folio)?;
        let hotel = find_hotel(&txn, snapshot.hotel_id).await?;
        let target = VoidTarget {
            id: transaction_id,
            folio_id: FolioId::from_uuid(original.folio_id),
            transaction_number: original.transaction_number,
            status: original.status.parse::<TransactionStatus>()?,
            is_balancing_entry: original.is_balancing_entry,
            gross_amount: original.gross_amount,
        };
        let plan = FolioService::prepare_void(&snapshot, &target, reason, hotel.current_working_date)?;

        let now = Utc::now().into();
        let number = next_transaction_number(&txn, snapshot.hotel_id).await?;

        let mut voided: folio_transactions::ActiveModel = original.clone().into();
        voided.status = Set(TransactionStatus::Voided.as_str().to_string());
        voided.voided_at = Set(Some(now));
        voided.voided_by = Set(voided_by.map(UserId::into_inner));
        voided.void_reason = Set(Some(plan.reason.clone()));
        voided.updated_at = Set(now);
        let original = voided.update(&txn).await.map_err(database_error)?;

        let balancing_entry = folio_transactions::ActiveModel {
            id: Set(FolioTransactionId::new().into_inner()),
            hotel_id: Set(folio.hotel_id),
            folio_id: Set(folio.id),
            transaction_number: Set(number),
            reservation_room_id: Set(original.reservation_room_id),
            guest_id: Set(original.guest_id),
            category: Set(TransactionCategory::Void.as_str().to_string()),
            transaction_type: Set(plan.transaction_type.as_str().to_string()),
            description: Set(Some(plan.description.clone())),
            amount: Set(plan.balancing_amount),
            discount_rate: Set(None),
            discount_amount: Set(Decimal::ZERO),
            tax_rate: Set(Decimal::ZERO),
            tax_amount: Set(Decimal::ZERO),
            net_amount: Set(plan.balancing_amount),
            service_charge_rate: Set(None),
            service_charge_amount: Set(Decimal::ZERO),
            gross_amount: Set(plan.balancing_amount),
            balance_after: Set(plan.balance_after),
            status: Set(TransactionStatus::Posted.as_str().to_string()),
            is_balancing_entry: Set(true),
            reverses_transaction_id: Set(Some(original.id)),
            current_working_date: Set(plan.working_date),
            created_by: Set(voided_by.map(UserId::into_inner)),
            voided_at: Set(None),
            voided_by: Set(None),
            void_reason: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => LedgerError::AlreadyVoided(transaction_id),
            _ => database_error(e),
        })?;

        let status = plan.resulting_status(snapshot.status);
        let folio = write_folio_state(&txn, folio, plan.balance_after, status).await?;
        txn.commit().await.map_err(database_error)?;

        info!(
            balancing_entry_id = %balancing_entry.id,
            amount = %plan.balancing_amount,
            balance = %folio.balance,
            status = %folio.status,
            "Transaction voided"
        );
        Ok(VoidResult {
            original,
            balancing_entry,
            folio,
            status_change: plan.status_change,
        })
    }

    /// Replays every transaction of a folio in `transaction_number` order and
    /// repairs the stored balance if it drifted.
    ///
    /// # Errors
    ///
    /// Returns `FolioNotFound` or `Database`.
    #[instrument(skip(self), fields(folio_id = %folio_id))]
    pub async fn recalculate_folio_totals(
        &self,
        folio_id: FolioId,
    ) -> Result<RecalculationResult, LedgerError> {
        let txn = self.db.begin().await.map_err(database_error)?;
        let folio = lock_folio(&txn, folio_id).await?;
        let snapshot = snapshot(&folio)?;

        let entries = folio_transactions::Entity::find()
            .filter(folio_transactions::Column::FolioId.eq(folio.id))
            .order_by_asc(folio_transactions::Column::TransactionNumber)
            .all(&txn)
            .await
            .map_err(database_error)?
            .into_iter()
            .map(|t| {
                Ok(LedgerEntry {
                    transaction_number: t.transaction_number,
                    status: t.status.parse::<TransactionStatus>()?,
                    is_balancing_entry: t.is_balancing_entry,
                    gross_amount: t.gross_amount,
                })
            })
            .collect::<Result<Vec<_>, LedgerError>>()?;

        let reconciliation = FolioService::reconcile(&snapshot, &entries);
        let repaired = !reconciliation.is_consistent();
        if repaired {
            warn!(
                stored = %reconciliation.stored_balance,
                replayed = %reconciliation.replayed_balance,
                drift = %reconciliation.drift,
                "Folio balance drift detected, repairing"
            );
        }
        if repaired || reconciliation.status_change.is_some() {
            let status = reconciliation
                .status_change
                .map_or(snapshot.status, |change| change.to);
            write_folio_state(&txn, folio, reconciliation.replayed_balance, status).await?;
        }
        txn.commit().await.map_err(database_error)?;

        Ok(RecalculationResult {
            folio_id,
            stored_balance: reconciliation.stored_balance,
            replayed_balance: reconciliation.replayed_balance,
            drift: reconciliation.drift,
            repaired,
            status_change: reconciliation.status_change,
        })
    }

    /// Voids a settled folio. Folios are never deleted.
    ///
    /// # Errors
    ///
    /// Returns `FolioHasBalance` unless the balance is zero, and
    /// `FolioNotPostable` unless the folio is open or closed.
    #[instrument(skip(self), fields(folio_id = %folio_id))]
    pub async fn void_folio(&self, folio_id: FolioId) -> Result<folios::Model, LedgerError> {
        let txn = self.db.begin().await.map_err(database_error)?;
        let folio = lock_folio(&txn, folio_id).await?;
        FolioService::validate_folio_void(&snapshot(&folio)?)?;

        let balance = folio.balance;
        let folio = write_folio_state(&txn, folio, balance, FolioStatus::Voided).await?;
        txn.commit().await.map_err(database_error)?;

        info!("Folio voided");
        Ok(folio)
    }

    /// The hotel's validated tax graph. Load it before opening a storage
    /// transaction; the lookup may need its own connection.
    pub(crate) async fn tax_graph(&self, hotel_id: HotelId) -> Result<Arc<TaxGraph>, LedgerError> {
        Ok(self.taxes.load_graph(hotel_id).await?)
    }

    /// Posts one transaction inside a caller-owned storage transaction.
    pub(crate) async fn post_in(
        &self,
        txn: &DatabaseTransaction,
        input: &PostingInput,
        graph: &TaxGraph,
    ) -> Result<PostingResult, LedgerError> {
        let folio = lock_folio(txn, input.folio_id).await?;
        let snapshot = snapshot(&folio)?;
        if graph.hotel_id() != snapshot.hotel_id {
            return Err(LedgerError::Internal(format!(
                "tax graph of hotel {} used for folio {}",
                graph.hotel_id(),
                snapshot.id
            )));
        }
        let hotel = find_hotel(txn, snapshot.hotel_id).await?;
        let working_date = input.working_date.unwrap_or(hotel.current_working_date);

        let prior = match input.reservation_room_id {
            Some(room) => prior_tax_occurrences(txn, room).await?,
            None => HashMap::new(),
        };

        let plan = FolioService::prepare_posting(&snapshot, input, working_date, graph, &prior)?;
        let number = next_transaction_number(txn, snapshot.hotel_id).await?;
        let now = Utc::now().into();

        let transaction = folio_transactions::ActiveModel {
            id: Set(FolioTransactionId::new().into_inner()),
            hotel_id: Set(folio.hotel_id),
            folio_id: Set(folio.id),
            transaction_number: Set(number),
            reservation_room_id: Set(input.reservation_room_id.map(ReservationRoomId::into_inner)),
            guest_id: Set(input.guest_id.map(GuestId::into_inner).or(folio.guest_id)),
            category: Set(plan.category.as_str().to_string()),
            transaction_type: Set(plan.transaction_type.as_str().to_string()),
            description: Set(input.description.clone()),
            amount: Set(plan.amount),
            discount_rate: Set(plan.discount_rate),
            discount_amount: Set(plan.discount_amount),
            tax_rate: Set(plan.taxes.aggregate_rate),
            tax_amount: Set(plan.taxes.total),
            net_amount: Set(plan.net_amount),
            service_charge_rate: Set(plan.service_charge_rate),
            service_charge_amount: Set(plan.service_charge_amount),
            gross_amount: Set(plan.gross_amount),
            balance_after: Set(plan.balance_after),
            status: Set(TransactionStatus::Posted.as_str().to_string()),
            is_balancing_entry: Set(false),
            reverses_transaction_id: Set(None),
            current_working_date: Set(plan.working_date),
            created_by: Set(input.created_by.map(UserId::into_inner)),
            voided_at: Set(None),
            voided_by: Set(None),
            void_reason: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(txn)
        .await
        .map_err(|e| match input.reservation_room_id {
            Some(reservation_room_id) if is_room_charge_conflict(&e) => LedgerError::AlreadyPosted {
                reservation_room_id,
                working_date: plan.working_date,
            },
            _ => database_error(e),
        })?;

        let mut tax_lines = Vec::with_capacity(plan.taxes.lines.len());
        for (order, line) in plan.taxes.lines.iter().enumerate() {
            let row = folio_transaction_taxes::ActiveModel {
                id: Set(Uuid::now_v7()),
                folio_transaction_id: Set(transaction.id),
                tax_rate_id: Set(line.tax_rate_id.into_inner()),
                line_order: Set(i32::try_from(order).unwrap_or(i32::MAX)),
                tax_amount: Set(line.tax_amount),
                tax_rate_percentage: Set(line.rate_percentage),
                taxable_amount: Set(line.taxable_amount),
                created_at: Set(now),
            }
            .insert(txn)
            .await
            .map_err(database_error)?;
            tax_lines.push(row);
        }

        let status = plan.resulting_status(snapshot.status);
        let folio = write_folio_state(txn, folio, plan.balance_after, status).await?;

        Ok(PostingResult {
            transaction,
            tax_lines,
            folio,
            status_change: plan.status_change,
        })
    }
}

impl From<TaxRateError> for LedgerError {
    fn from(err: TaxRateError) -> Self {
        match err {
            TaxRateError::Configuration(e) => Self::Tax(e),
            TaxRateError::Database(e) => database_error(e),
        }
    }
}

/// Maps a storage error; unique violations outside the known indexes mean a
/// concurrent writer got there first.
pub(crate) fn database_error(err: DbErr) -> LedgerError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => LedgerError::ConcurrentModification,
        _ => LedgerError::Database(err.to_string()),
    }
}

/// Returns true if `err` is a violation of the room charge index.
pub(crate) fn is_room_charge_conflict(err: &DbErr) -> bool {
    matches!(
        err.sql_err(),
        Some(SqlErr::UniqueConstraintViolation(msg)) if msg.contains(ROOM_CHARGE_INDEX)
    )
}

/// Locks a folio row for the rest of the transaction.
pub(crate) async fn lock_folio(
    txn: &DatabaseTransaction,
    folio_id: FolioId,
) -> Result<folios::Model, LedgerError> {
    folios::Entity::find_by_id(folio_id.into_inner())
        .lock_exclusive()
        .one(txn)
        .await
        .map_err(database_error)?
        .ok_or(LedgerError::FolioNotFound(folio_id))
}

/// Locks several folio rows in ascending id order.
///
/// Callers that post to more than one folio in a transaction take these
/// locks before anything else, so they never hold the sequence row while
/// waiting on a folio.
pub(crate) async fn lock_folios(
    txn: &DatabaseTransaction,
    folio_ids: impl IntoIterator<Item = FolioId>,
) -> Result<Vec<folios::Model>, LedgerError> {
    let ids: BTreeSet<FolioId> = folio_ids.into_iter().collect();
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let locked = folios::Entity::find()
        .filter(folios::Column::Id.is_in(ids.iter().map(|id| id.into_inner())))
        .order_by_asc(folios::Column::Id)
        .lock_exclusive()
        .all(txn)
        .await
        .map_err(database_error)?;
    if let Some(missing) = ids
        .iter()
        .find(|id| !locked.iter().any(|f| f.id == id.into_inner()))
    {
        return Err(LedgerError::FolioNotFound(*missing));
    }
    Ok(locked)
}

fn snapshot(folio: &folios::Model) -> Result<FolioSnapshot, LedgerError> {
    Ok(FolioSnapshot {
        id: FolioId::from_uuid(folio.id),
        hotel_id: HotelId::from_uuid(folio.hotel_id),
        status: folio.status.parse()?,
        balance: folio.balance,
    })
}

async fn find_hotel(
    txn: &DatabaseTransaction,
    hotel_id: HotelId,
) -> Result<hotels::Model, LedgerError> {
    hotels::Entity::find_by_id(hotel_id.into_inner())
        .one(txn)
        .await
        .map_err(database_error)?
        .ok_or(LedgerError::HotelNotFound(hotel_id))
}

/// Issues the next per-hotel transaction number under a row lock.
async fn next_transaction_number(
    txn: &DatabaseTransaction,
    hotel_id: HotelId,
) -> Result<i64, LedgerError> {
    let now = Utc::now().into();
    let sequence = hotel_transaction_sequences::Entity::find_by_id(hotel_id.into_inner())
        .lock_exclusive()
        .one(txn)
        .await
        .map_err(database_error)?;

    match sequence {
        Some(sequence) => {
            let next = sequence.last_number + 1;
            let mut sequence: hotel_transaction_sequences::ActiveModel = sequence.into();
            sequence.last_number = Set(next);
            sequence.updated_at = Set(now);
            sequence.update(txn).await.map_err(database_error)?;
            Ok(next)
        }
        // First posting of the hotel; a concurrent first posting loses on the
        // primary key and surfaces as ConcurrentModification.
        None => {
            hotel_transaction_sequences::ActiveModel {
                hotel_id: Set(hotel_id.into_inner()),
                last_number: Set(1),
                updated_at: Set(now),
            }
            .insert(txn)
            .await
            .map_err(database_error)?;
            Ok(1)
        }
    }
}

/// Counts, per tax rate, how often a tax was applied to non-voided postings
/// of a reservation room.
async fn prior_tax_occurrences(
    txn: &DatabaseTransaction,
    reservation_room_id: ReservationRoomId,
) -> Result<HashMap<TaxRateId, u32>, LedgerError> {
    let rows: Vec<(Uuid, i64)> = folio_transaction_taxes::Entity::find()
        .select_only()
        .column(folio_transaction_taxes::Column::TaxRateId)
        .column_as(
            Expr::col((
                folio_transaction_taxes::Entity,
                folio_transaction_taxes::Column::Id,
            ))
            .count(),
            "occurrences",
        )
        .inner_join(folio_transactions::Entity)
        .filter(
            folio_transactions::Column::ReservationRoomId.eq(reservation_room_id.into_inner()),
        )
        .filter(folio_transactions::Column::Status.ne(TransactionStatus::Voided.as_str()))
        .group_by(folio_transaction_taxes::Column::TaxRateId)
        .into_tuple()
        .all(txn)
        .await
        .map_err(database_error)?;

    Ok(rows
        .into_iter()
        .map(|(id, count)| (TaxRateId::from_uuid(id), u32::try_from(count).unwrap_or(u32::MAX)))
        .collect())
}

/// Writes balance and status together; stamps or clears `closed_at`.
async fn write_folio_state(
    txn: &DatabaseTransaction,
    folio: folios::Model,
    balance: Decimal,
    status: FolioStatus,
) -> Result<folios::Model, LedgerError> {
    let now = Utc::now();
    let was_closed = folio.status == FolioStatus::Closed.as_str();

    let mut model: folios::ActiveModel = folio.into();
    model.balance = Set(balance);
    model.status = Set(status.as_str().to_string());
    match status {
        FolioStatus::Closed if !was_closed => model.closed_at = Set(Some(now.into())),
        FolioStatus::Open if was_closed => model.closed_at = Set(None),
        _ => {}
    }
    model.updated_at = Set(now.into());
    model.update(txn).await.map_err(database_error)
}

fn folio_number(id: FolioId) -> String {
    let simple = id.into_inner().simple().to_string();
    format!("F-{}", simple[simple.len() - 10..].to_uppercase())
}
