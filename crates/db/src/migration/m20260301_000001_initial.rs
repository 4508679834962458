//! Initial database migration.
//!
//! Creates hotels, reservations, tax configuration and the folio ledger,
//! plus the triggers guarding posted ledger rows.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: HOTELS
        // ============================================================
        db.execute_unprepared(HOTELS_SQL).await?;
        db.execute_unprepared(HOTEL_TRANSACTION_SEQUENCES_SQL).await?;

        // ============================================================
        // PART 2: RESERVATIONS
        // ============================================================
        db.execute_unprepared(RESERVATIONS_SQL).await?;

        // ============================================================
        // PART 3: TAX CONFIGURATION
        // ============================================================
        db.execute_unprepared(TAX_RATES_SQL).await?;

        // ============================================================
        // PART 4: FOLIO LEDGER
        // ============================================================
        db.execute_unprepared(FOLIOS_SQL).await?;
        db.execute_unprepared(FOLIO_TRANSACTIONS_SQL).await?;
        db.execute_unprepared(FOLIO_TRANSACTION_TAXES_SQL).await?;

        // ============================================================
        // PART 5: NIGHT AUDIT OUTPUT
        // ============================================================
        db.execute_unprepared(DAILY_SUMMARY_FACTS_SQL).await?;

        // ============================================================
        // PART 6: FUNCTIONS & TRIGGERS
        // ============================================================
        db.execute_unprepared(FUNCTIONS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const HOTELS_SQL: &str = r"
CREATE TABLE hotels (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name VARCHAR(255) NOT NULL,
    timezone VARCHAR(50) NOT NULL DEFAULT 'UTC',
    currency CHAR(3) NOT NULL,
    current_working_date DATE NOT NULL,
    night_audit_start_time TIME NOT NULL DEFAULT '02:00',
    night_audit_end_time TIME NOT NULL DEFAULT '05:00',
    last_night_audit_date DATE,
    no_show_fee_policy VARCHAR(20) NOT NULL DEFAULT 'none',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_hotel_currency CHECK (currency ~ '^[A-Z]{3}$'),
    CONSTRAINT chk_no_show_fee_policy CHECK (no_show_fee_policy IN ('none', 'first_night')),
    CONSTRAINT chk_last_audit_before_working_date CHECK (
        last_night_audit_date IS NULL OR last_night_audit_date < current_working_date
    )
);
";

const HOTEL_TRANSACTION_SEQUENCES_SQL: &str = r"
-- Per-hotel transaction numbers, issued under a row lock
CREATE TABLE hotel_transaction_sequences (
    hotel_id UUID PRIMARY KEY REFERENCES hotels(id) ON DELETE CASCADE,
    last_number BIGINT NOT NULL DEFAULT 0,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_last_number_non_negative CHECK (last_number >= 0)
);
";

const RESERVATIONS_SQL: &str = r"
CREATE TABLE reservations (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    hotel_id UUID NOT NULL REFERENCES hotels(id) ON DELETE RESTRICT,
    guest_id UUID,
    company_id UUID,
    status VARCHAR(20) NOT NULL DEFAULT 'confirmed',
    arrival_date DATE NOT NULL,
    departure_date DATE NOT NULL,
    -- business date of the audit that marked the no-show
    no_show_date DATE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_reservation_status CHECK (
        status IN ('confirmed', 'checked_in', 'checked_out', 'cancelled', 'no_show')
    ),
    CONSTRAINT chk_reservation_dates CHECK (departure_date > arrival_date)
);

CREATE INDEX idx_reservations_no_show ON reservations(hotel_id, arrival_date)
    WHERE status = 'confirmed';
CREATE INDEX idx_reservations_no_show_date ON reservations(hotel_id, no_show_date)
    WHERE no_show_date IS NOT NULL;

CREATE TABLE reservation_rooms (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    reservation_id UUID NOT NULL REFERENCES reservations(id) ON DELETE RESTRICT,
    hotel_id UUID NOT NULL REFERENCES hotels(id) ON DELETE RESTRICT,
    folio_id UUID,
    room_type_id UUID,
    rate_type_id UUID,
    arrival_date DATE NOT NULL,
    departure_date DATE NOT NULL,
    adults INTEGER NOT NULL DEFAULT 1,
    children INTEGER NOT NULL DEFAULT 0,
    nightly_rate NUMERIC(19, 4) NOT NULL,
    meal_plan VARCHAR(20) NOT NULL DEFAULT 'room_only',
    meal_plan_included BOOLEAN NOT NULL DEFAULT false,
    meal_plan_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    status VARCHAR(20) NOT NULL DEFAULT 'reserved',
    is_due_out BOOLEAN NOT NULL DEFAULT false,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_room_stay_status CHECK (
        status IN ('reserved', 'in_house', 'checked_out', 'cancelled', 'no_show')
    ),
    CONSTRAINT chk_meal_plan CHECK (
        meal_plan IN ('room_only', 'breakfast', 'half_board', 'full_board')
    ),
    CONSTRAINT chk_room_dates CHECK (departure_date > arrival_date),
    CONSTRAINT chk_occupancy CHECK (adults >= 0 AND children >= 0),
    CONSTRAINT chk_nightly_rate CHECK (nightly_rate >= 0),
    CONSTRAINT chk_meal_plan_amount CHECK (meal_plan_amount >= 0)
);

CREATE INDEX idx_reservation_rooms_stay ON reservation_rooms(hotel_id, arrival_date, departure_date);
CREATE INDEX idx_reservation_rooms_reservation ON reservation_rooms(reservation_id);
";

const TAX_RATES_SQL: &str = r"
CREATE TABLE tax_rates (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    hotel_id UUID NOT NULL REFERENCES hotels(id) ON DELETE RESTRICT,
    name VARCHAR(100) NOT NULL,
    rate_percentage NUMERIC(19, 4) NOT NULL,
    posting_type VARCHAR(20) NOT NULL,
    apply_tax VARCHAR(20) NOT NULL DEFAULT 'after_discount',
    applies_to_room_rate BOOLEAN NOT NULL DEFAULT true,
    applies_to_fnb BOOLEAN NOT NULL DEFAULT false,
    applies_to_other BOOLEAN NOT NULL DEFAULT false,
    effective_date DATE NOT NULL,
    end_date DATE,
    exempt_after INTEGER,
    priority INTEGER NOT NULL DEFAULT 0,
    is_active BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_posting_type CHECK (posting_type IN ('flat_amount', 'flat_percentage', 'slab')),
    CONSTRAINT chk_apply_tax CHECK (apply_tax IN ('before_discount', 'after_discount')),
    CONSTRAINT chk_tax_rate_non_negative CHECK (rate_percentage >= 0),
    CONSTRAINT chk_tax_effective_range CHECK (end_date IS NULL OR end_date >= effective_date),
    CONSTRAINT chk_exempt_after CHECK (exempt_after IS NULL OR exempt_after >= 0)
);

CREATE INDEX idx_tax_rates_hotel ON tax_rates(hotel_id) WHERE is_active;

CREATE TABLE tax_rate_slabs (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    tax_rate_id UUID NOT NULL REFERENCES tax_rates(id) ON DELETE CASCADE,
    min_amount NUMERIC(19, 4) NOT NULL,
    max_amount NUMERIC(19, 4),
    rate_percentage NUMERIC(9, 4) NOT NULL,
    CONSTRAINT chk_slab_range CHECK (max_amount IS NULL OR max_amount > min_amount),
    CONSTRAINT chk_slab_rate CHECK (rate_percentage >= 0)
);

CREATE INDEX idx_tax_rate_slabs_rate ON tax_rate_slabs(tax_rate_id, min_amount);

-- tax_apply_after edges; cycles are rejected by the application before insert
CREATE TABLE tax_rate_dependencies (
    tax_rate_id UUID NOT NULL REFERENCES tax_rates(id) ON DELETE CASCADE,
    depends_on_tax_rate_id UUID NOT NULL REFERENCES tax_rates(id) ON DELETE RESTRICT,
    PRIMARY KEY (tax_rate_id, depends_on_tax_rate_id),
    CONSTRAINT chk_no_self_dependency CHECK (tax_rate_id <> depends_on_tax_rate_id)
);
";

const FOLIOS_SQL: &str = r"
CREATE TABLE folios (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    hotel_id UUID NOT NULL REFERENCES hotels(id) ON DELETE RESTRICT,
    folio_number VARCHAR(50) NOT NULL,
    guest_id UUID,
    reservation_id UUID REFERENCES reservations(id) ON DELETE RESTRICT,
    company_id UUID,
    status VARCHAR(20) NOT NULL DEFAULT 'open',
    workflow_status VARCHAR(20) NOT NULL DEFAULT 'active',
    balance NUMERIC(19, 4) NOT NULL DEFAULT 0,
    currency CHAR(3) NOT NULL,
    print_count INTEGER NOT NULL DEFAULT 0,
    closed_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_folio_number UNIQUE (hotel_id, folio_number),
    CONSTRAINT chk_folio_status CHECK (
        status IN ('open', 'closed', 'transferred', 'disputed', 'voided')
    ),
    CONSTRAINT chk_folio_workflow_status CHECK (
        workflow_status IN ('draft', 'active', 'review', 'approved', 'finalized', 'closed')
    ),
    CONSTRAINT chk_voided_folio_settled CHECK (status <> 'voided' OR balance = 0)
);

CREATE INDEX idx_folios_hotel_status ON folios(hotel_id, status);

ALTER TABLE reservation_rooms
    ADD CONSTRAINT fk_reservation_rooms_folio FOREIGN KEY (folio_id) REFERENCES folios(id) ON DELETE RESTRICT;
";

const FOLIO_TRANSACTIONS_SQL: &str = r"
CREATE TABLE folio_transactions (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    hotel_id UUID NOT NULL REFERENCES hotels(id) ON DELETE RESTRICT,
    folio_id UUID NOT NULL REFERENCES folios(id) ON DELETE RESTRICT,
    transaction_number BIGINT NOT NULL,
    reservation_room_id UUID REFERENCES reservation_rooms(id) ON DELETE RESTRICT,
    guest_id UUID,
    category VARCHAR(30) NOT NULL,
    transaction_type VARCHAR(10) NOT NULL,
    description TEXT,
    amount NUMERIC(19, 4) NOT NULL,
    discount_rate NUMERIC(9, 4),
    discount_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    tax_rate NUMERIC(9, 4) NOT NULL DEFAULT 0,
    tax_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    net_amount NUMERIC(19, 4) NOT NULL,
    service_charge_rate NUMERIC(9, 4),
    service_charge_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    gross_amount NUMERIC(19, 4) NOT NULL,
    balance_after NUMERIC(19, 4) NOT NULL,
    status VARCHAR(20) NOT NULL DEFAULT 'posted',
    is_balancing_entry BOOLEAN NOT NULL DEFAULT false,
    reverses_transaction_id UUID REFERENCES folio_transactions(id) ON DELETE RESTRICT,
    current_working_date DATE NOT NULL,
    created_by UUID,
    voided_at TIMESTAMPTZ,
    voided_by UUID,
    void_reason TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    -- Transaction numbers are unique per hotel, not globally
    CONSTRAINT uq_transaction_number UNIQUE (hotel_id, transaction_number),
    CONSTRAINT chk_category CHECK (category IN (
        'room', 'food_and_beverage', 'miscellaneous', 'service_charge', 'tax',
        'no_show_fee', 'refund', 'payment', 'discount', 'adjustment', 'void', 'transfer'
    )),
    CONSTRAINT chk_transaction_type CHECK (transaction_type IN ('debit', 'credit')),
    CONSTRAINT chk_transaction_status CHECK (status IN (
        'pending', 'posted', 'voided', 'transferred', 'disputed', 'refunded',
        'write_off', 'correction', 'completed', 'failed', 'cancelled'
    )),
    CONSTRAINT chk_amount_non_zero CHECK (amount <> 0),
    CONSTRAINT chk_void_reason CHECK (
        status <> 'voided' OR (voided_at IS NOT NULL AND void_reason IS NOT NULL)
    ),
    CONSTRAINT chk_balancing_entry CHECK (
        is_balancing_entry = (reverses_transaction_id IS NOT NULL)
    )
);

CREATE INDEX idx_folio_transactions_folio ON folio_transactions(folio_id, transaction_number);
CREATE INDEX idx_folio_transactions_working_date ON folio_transactions(hotel_id, current_working_date);

-- Night audit idempotence: one room charge per reservation room per business date
CREATE UNIQUE INDEX uq_room_charge_per_night ON folio_transactions(hotel_id, reservation_room_id, current_working_date)
    WHERE category = 'room' AND NOT is_balancing_entry;

-- A transaction is voided at most once
CREATE UNIQUE INDEX uq_balancing_entry ON folio_transactions(reverses_transaction_id)
    WHERE reverses_transaction_id IS NOT NULL;
";

const FOLIO_TRANSACTION_TAXES_SQL: &str = r"
CREATE TABLE folio_transaction_taxes (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    folio_transaction_id UUID NOT NULL REFERENCES folio_transactions(id) ON DELETE RESTRICT,
    tax_rate_id UUID NOT NULL REFERENCES tax_rates(id) ON DELETE RESTRICT,
    line_order INTEGER NOT NULL,
    tax_amount NUMERIC(19, 4) NOT NULL,
    tax_rate_percentage NUMERIC(19, 4) NOT NULL,
    taxable_amount NUMERIC(19, 4) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_transaction_tax UNIQUE (folio_transaction_id, tax_rate_id)
);

CREATE INDEX idx_folio_transaction_taxes_rate ON folio_transaction_taxes(tax_rate_id);
";

const DAILY_SUMMARY_FACTS_SQL: &str = r"
CREATE TABLE daily_summary_facts (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    hotel_id UUID NOT NULL REFERENCES hotels(id) ON DELETE RESTRICT,
    audit_date DATE NOT NULL,
    room_revenue NUMERIC(19, 4) NOT NULL DEFAULT 0,
    fnb_revenue NUMERIC(19, 4) NOT NULL DEFAULT 0,
    other_revenue NUMERIC(19, 4) NOT NULL DEFAULT 0,
    no_show_revenue NUMERIC(19, 4) NOT NULL DEFAULT 0,
    tax_total NUMERIC(19, 4) NOT NULL DEFAULT 0,
    discount_total NUMERIC(19, 4) NOT NULL DEFAULT 0,
    payment_total NUMERIC(19, 4) NOT NULL DEFAULT 0,
    adjustment_total NUMERIC(19, 4) NOT NULL DEFAULT 0,
    room_charges_posted INTEGER NOT NULL DEFAULT 0,
    rooms_occupied INTEGER NOT NULL DEFAULT 0,
    no_show_count INTEGER NOT NULL DEFAULT 0,
    due_out_count INTEGER NOT NULL DEFAULT 0,
    guest_ledger_balance NUMERIC(19, 4) NOT NULL DEFAULT 0,
    city_ledger_balance NUMERIC(19, 4) NOT NULL DEFAULT 0,
    total_ledger_balance NUMERIC(19, 4) NOT NULL DEFAULT 0,
    audit_mode VARCHAR(10) NOT NULL,
    generated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_daily_summary UNIQUE (hotel_id, audit_date),
    CONSTRAINT chk_audit_mode CHECK (audit_mode IN ('live', 'backfill'))
);
";

const FUNCTIONS_SQL: &str = r"
-- ============================================================
-- FUNCTION: prevent_posted_amount_modification
-- Posted ledger rows only change status and void stamps
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_posted_amount_modification()
RETURNS TRIGGER AS $$
BEGIN
    IF NEW.amount IS DISTINCT FROM OLD.amount
        OR NEW.net_amount IS DISTINCT FROM OLD.net_amount
        OR NEW.gross_amount IS DISTINCT FROM OLD.gross_amount
        OR NEW.tax_amount IS DISTINCT FROM OLD.tax_amount
        OR NEW.transaction_number IS DISTINCT FROM OLD.transaction_number
        OR NEW.folio_id IS DISTINCT FROM OLD.folio_id THEN
        RAISE EXCEPTION 'Cannot modify amounts of a folio transaction. Void it instead.';
    END IF;

    IF OLD.status = 'voided' AND NEW.status <> 'voided' THEN
        RAISE EXCEPTION 'Cannot modify voided folio transaction.';
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_posted_amount_mod
BEFORE UPDATE ON folio_transactions
FOR EACH ROW
EXECUTE FUNCTION prevent_posted_amount_modification();

-- ============================================================
-- FUNCTION: prevent_ledger_delete
-- Folio history is never deleted
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_ledger_delete()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION 'Folio ledger rows cannot be deleted.';
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_folio_transaction_delete
BEFORE DELETE ON folio_transactions
FOR EACH ROW
EXECUTE FUNCTION prevent_ledger_delete();

CREATE TRIGGER trg_prevent_folio_delete
BEFORE DELETE ON folios
FOR EACH ROW
EXECUTE FUNCTION prevent_ledger_delete();
";

const DROP_ALL_SQL: &str = r"
-- ============================================================
-- DROP ALL: Rollback migration
-- Order matters due to foreign key constraints
-- ============================================================

-- Drop triggers
DROP TRIGGER IF EXISTS trg_prevent_folio_delete ON folios;
DROP TRIGGER IF EXISTS trg_prevent_folio_transaction_delete ON folio_transactions;
DROP TRIGGER IF EXISTS trg_prevent_posted_amount_mod ON folio_transactions;

-- Drop functions
DROP FUNCTION IF EXISTS prevent_ledger_delete();
DROP FUNCTION IF EXISTS prevent_posted_amount_modification();

-- Drop tables (reverse order of creation)
DROP TABLE IF EXISTS daily_summary_facts CASCADE;
DROP TABLE IF EXISTS folio_transaction_taxes CASCADE;
DROP TABLE IF EXISTS folio_transactions CASCADE;
ALTER TABLE IF EXISTS reservation_rooms DROP CONSTRAINT IF EXISTS fk_reservation_rooms_folio;
DROP TABLE IF EXISTS folios CASCADE;
DROP TABLE IF EXISTS tax_rate_dependencies CASCADE;
DROP TABLE IF EXISTS tax_rate_slabs CASCADE;
DROP TABLE IF EXISTS tax_rates CASCADE;
DROP TABLE IF EXISTS reservation_rooms CASCADE;
DROP TABLE IF EXISTS reservations CASCADE;
DROP TABLE IF EXISTS hotel_transaction_sequences CASCADE;
DROP TABLE IF EXISTS hotels CASCADE;
";
