//! Folio ledger integration tests.
//!
//! Covers posting with tax through the repository, the status hook, voids
//! with balancing entries, drift repair, tax cycle rejection and concurrent
//! postings against one folio.

#![allow(clippy::uninlined_format_args)]

mod common;

use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

use innkeep_core::folio::{
    FolioStatus, LedgerError, PostingInput, TransactionCategory, TransactionType,
};
use innkeep_core::night_audit::NoShowFeePolicy;
use innkeep_core::tax::{ApplyTax, PostingType, TaxError, TaxRate};
use innkeep_db::TaxRateRepository;
use innkeep_db::entities::folios;
use innkeep_db::repositories::TaxRateError;
use innkeep_shared::types::{FolioId, FolioTransactionId, HotelId, TaxRateId};

use common::{connect, d, folio_repository, hotel, open_folio};

fn percentage_tax(hotel_id: HotelId, rate: Decimal) -> TaxRate {
    TaxRate {
        id: TaxRateId::new(),
        hotel_id,
        name: format!("VAT {rate}%"),
        rate_percentage: rate,
        posting_type: PostingType::FlatPercentage,
        apply_tax: ApplyTax::AfterDiscount,
        applies_to_room_rate: true,
        applies_to_fnb: true,
        applies_to_other: false,
        effective_date: d(2024, 1, 1),
        end_date: None,
        exempt_after: None,
        tax_apply_after: Vec::new(),
        priority: 0,
        is_active: true,
        slabs: Vec::new(),
    }
}

fn charge(folio_id: FolioId, amount: Decimal) -> PostingInput {
    PostingInput::new(folio_id, TransactionCategory::Room, TransactionType::Debit, amount)
}

#[tokio::test]
async fn test_room_charge_with_tax_then_payment_closes_folio() {
    let Some(db) = connect().await else { return };
    let hotel_id = hotel(&db, d(2024, 5, 1), NoShowFeePolicy::None).await;
    TaxRateRepository::new(db.clone())
        .save_tax_rate(percentage_tax(hotel_id, dec!(10)))
        .await
        .unwrap();
    let folio_id = open_folio(&db, hotel_id).await;
    let repo = folio_repository(&db);

    let posted = repo.post_transaction(&charge(folio_id, dec!(100))).await.unwrap();
    assert_eq!(posted.transaction.amount, dec!(100));
    assert_eq!(posted.transaction.tax_amount, dec!(10));
    assert_eq!(posted.transaction.gross_amount, dec!(110));
    assert_eq!(posted.tax_lines.len(), 1);
    assert_eq!(posted.folio.balance, dec!(110));
    assert_eq!(posted.folio.status, FolioStatus::Open.as_str());
    assert_eq!(posted.transaction.current_working_date, d(2024, 5, 1));

    let payment = PostingInput::new(
        folio_id,
        TransactionCategory::Payment,
        TransactionType::Credit,
        dec!(-110),
    );
    let paid = repo.post_transaction(&payment).await.unwrap();
    assert_eq!(paid.transaction.tax_amount, Decimal::ZERO);
    assert_eq!(paid.folio.balance, Decimal::ZERO);
    assert_eq!(paid.folio.status, FolioStatus::Closed.as_str());
    assert!(paid.folio.closed_at.is_some());
    assert!(paid.status_change.is_some());
    assert!(paid.transaction.transaction_number > posted.transaction.transaction_number);
}

#[tokio::test]
async fn test_void_appends_balancing_entry_and_reopens() {
    let Some(db) = connect().await else { return };
    let hotel_id = hotel(&db, d(2024, 5, 1), NoShowFeePolicy::None).await;
    let folio_id = open_folio(&db, hotel_id).await;
    let repo = folio_repository(&db);

    repo.post_transaction(&charge(folio_id, dec!(80))).await.unwrap();
    let minibar = PostingInput::new(
        folio_id,
        TransactionCategory::Miscellaneous,
        TransactionType::Debit,
        dec!(20),
    );
    let minibar = repo.post_transaction(&minibar).await.unwrap();
    assert_eq!(minibar.folio.balance, dec!(100));

    let voided = repo
        .void_transaction(
            FolioTransactionId::from_uuid(minibar.transaction.id),
            "guest disputed minibar",
            None,
        )
        .await
        .unwrap();
    assert_eq!(voided.original.status, "voided");
    assert_eq!(voided.original.gross_amount, dec!(20));
    assert_eq!(voided.balancing_entry.gross_amount, dec!(-20));
    assert_eq!(voided.balancing_entry.reverses_transaction_id, Some(minibar.transaction.id));
    assert_eq!(voided.folio.balance, dec!(80));

    let history = repo.list_transactions(folio_id).await.unwrap();
    assert_eq!(history.len(), 3);

    let again = repo
        .void_transaction(
            FolioTransactionId::from_uuid(minibar.transaction.id),
            "twice",
            None,
        )
        .await;
    assert!(matches!(again, Err(LedgerError::AlreadyVoided(_))));

    let recalculated = repo.recalculate_folio_totals(folio_id).await.unwrap();
    assert_eq!(recalculated.replayed_balance, dec!(80));
    assert!(!recalculated.repaired);
}

#[tokio::test]
async fn test_recalculate_repairs_drift() {
    let Some(db) = connect().await else { return };
    let hotel_id = hotel(&db, d(2024, 5, 1), NoShowFeePolicy::None).await;
    let folio_id = open_folio(&db, hotel_id).await;
    let repo = folio_repository(&db);
    repo.post_transaction(&charge(folio_id, dec!(50))).await.unwrap();

    folios::Entity::update_many()
        .col_expr(folios::Column::Balance, Expr::value(dec!(42)))
        .filter(folios::Column::Id.eq(folio_id.into_inner()))
        .exec(&db)
        .await
        .unwrap();

    let result = repo.recalculate_folio_totals(folio_id).await.unwrap();
    assert!(result.repaired);
    assert_eq!(result.stored_balance, dec!(42));
    assert_eq!(result.replayed_balance, dec!(50));
    assert_eq!(result.drift, dec!(8));

    let folio = repo.find_folio(folio_id).await.unwrap().unwrap();
    assert_eq!(folio.balance, dec!(50));
}

#[tokio::test]
async fn test_void_folio_requires_zero_balance() {
    let Some(db) = connect().await else { return };
    let hotel_id = hotel(&db, d(2024, 5, 1), NoShowFeePolicy::None).await;
    let folio_id = open_folio(&db, hotel_id).await;
    let repo = folio_repository(&db);
    repo.post_transaction(&charge(folio_id, dec!(10))).await.unwrap();

    let result = repo.void_folio(folio_id).await;
    assert!(matches!(result, Err(LedgerError::FolioHasBalance { .. })));

    let empty = open_folio(&db, hotel_id).await;
    let voided = repo.void_folio(empty).await.unwrap();
    assert_eq!(voided.status, FolioStatus::Voided.as_str());

    let posting = repo.post_transaction(&charge(empty, dec!(10))).await;
    assert!(matches!(posting, Err(LedgerError::FolioNotPostable { .. })));
}

#[tokio::test]
async fn test_tax_cycle_rejected_before_any_write() {
    let Some(db) = connect().await else { return };
    let hotel_id = hotel(&db, d(2024, 5, 1), NoShowFeePolicy::None).await;
    let taxes = TaxRateRepository::new(db.clone());

    let service = taxes.save_tax_rate(percentage_tax(hotel_id, dec!(5))).await.unwrap();
    let mut vat = percentage_tax(hotel_id, dec!(10));
    vat.tax_apply_after = vec![service.id];
    let vat = taxes.save_tax_rate(vat).await.unwrap();

    let mut cyclic = service.clone();
    cyclic.tax_apply_after = vec![vat.id];
    let result = taxes.save_tax_rate(cyclic).await;
    assert!(matches!(
        result,
        Err(TaxRateError::Configuration(TaxError::CircularDependency { .. }))
    ));

    let stored = taxes.list_tax_rates(hotel_id).await.unwrap();
    let service_row = stored.iter().find(|r| r.id == service.id).unwrap();
    assert!(service_row.tax_apply_after.is_empty());

    // Compound: VAT is computed on the charge plus the applied service tax.
    let folio_id = open_folio(&db, hotel_id).await;
    let posted = folio_repository(&db)
        .post_transaction(&charge(folio_id, dec!(100)))
        .await
        .unwrap();
    assert_eq!(posted.tax_lines.len(), 2);
    assert_eq!(posted.transaction.tax_amount, dec!(15.50));
}

#[tokio::test]
async fn test_concurrent_postings_keep_balance_and_numbers() {
    let Some(db) = connect().await else { return };
    let hotel_id = hotel(&db, d(2024, 5, 1), NoShowFeePolicy::None).await;
    let folio_id = open_folio(&db, hotel_id).await;
    let repo = folio_repository(&db);

    let postings = (0..20).map(|_| {
        let repo = repo.clone();
        async move {
            let input = PostingInput::new(
                folio_id,
                TransactionCategory::Miscellaneous,
                TransactionType::Debit,
                dec!(10),
            );
            repo.post_transaction(&input).await
        }
    });
    let results = join_all(postings).await;
    let posted = results.into_iter().filter(Result::is_ok).count();
    assert_eq!(posted, 20, "every posting waits for the folio lock");

    let folio = repo.find_folio(folio_id).await.unwrap().unwrap();
    assert_eq!(folio.balance, dec!(200));

    let mut numbers: Vec<i64> = repo
        .list_transactions(folio_id)
        .await
        .unwrap()
        .iter()
        .map(|t| t.transaction_number)
        .collect();
    numbers.dedup();
    assert_eq!(numbers.len(), 20);

    let check = repo.recalculate_folio_totals(folio_id).await.unwrap();
    assert!(!check.repaired);
}
