//! Ledger schema: accounts, journal entries and lines, accounting periods.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: CHART OF ACCOUNTS
        // ============================================================
        db.execute_unprepared(ACCOUNTS_SQL).await?;

        // ============================================================
        // PART 3: JOURNAL
        // ============================================================
        db.execute_unprepared(JOURNAL_ENTRIES_SQL).await?;
        db.execute_unprepared(JOURNAL_LINES_SQL).await?;

        // ============================================================
        // PART 4: PERIODS
        // ============================================================
        db.execute_unprepared(ACCOUNTING_PERIODS_SQL).await?;

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

const ENUMS_SQL: &str = r"
CREATE TYPE account_type AS ENUM (
    'asset',
    'liability',
    'equity',
    'revenue',
    'expense'
);

CREATE TYPE entry_status AS ENUM ('draft', 'posted', 'reversed');

CREATE TYPE source_type AS ENUM (
    'sale',
    'purchase',
    'cash_bank',
    'payment',
    'manual',
    'closing',
    'reversal'
);
";

const ACCOUNTS_SQL: &str = r"
CREATE TABLE accounts (
    id UUID PRIMARY KEY,
    code VARCHAR(20) NOT NULL,
    name VARCHAR(255) NOT NULL,
    account_type account_type NOT NULL,
    parent_id UUID REFERENCES accounts(id),
    level INTEGER NOT NULL DEFAULT 1 CHECK (level >= 1),
    is_header BOOLEAN NOT NULL DEFAULT false,
    balance NUMERIC(19, 2) NOT NULL DEFAULT 0,
    is_active BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    deleted_at TIMESTAMPTZ
);

-- codes are unique among live accounts only
CREATE UNIQUE INDEX idx_accounts_code ON accounts(code) WHERE deleted_at IS NULL;
CREATE INDEX idx_accounts_parent ON accounts(parent_id) WHERE parent_id IS NOT NULL;
";

const JOURNAL_ENTRIES_SQL: &str = r"
CREATE SEQUENCE journal_entry_code_seq;

CREATE TABLE journal_entries (
    id UUID PRIMARY KEY,
    code VARCHAR(32) NOT NULL UNIQUE,
    entry_date DATE NOT NULL,
    description TEXT NOT NULL,
    source_type source_type NOT NULL,
    source_id UUID,
    status entry_status NOT NULL DEFAULT 'draft',
    total_debit NUMERIC(19, 2) NOT NULL DEFAULT 0,
    total_credit NUMERIC(19, 2) NOT NULL DEFAULT 0,
    reversal_id UUID REFERENCES journal_entries(id),
    created_by UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    posted_by UUID,
    posted_at TIMESTAMPTZ,
    deleted_at TIMESTAMPTZ,

    CONSTRAINT chk_entry_totals_non_negative CHECK (total_debit >= 0 AND total_credit >= 0),
    CONSTRAINT chk_posted_stamped CHECK (status = 'draft' OR posted_at IS NOT NULL)
);

CREATE INDEX idx_journal_entries_date ON journal_entries(entry_date, code) WHERE deleted_at IS NULL;
CREATE INDEX idx_journal_entries_status ON journal_entries(status) WHERE deleted_at IS NULL;
";

const JOURNAL_LINES_SQL: &str = r"
CREATE TABLE journal_lines (
    id UUID PRIMARY KEY,
    journal_id UUID NOT NULL REFERENCES journal_entries(id),
    account_id UUID NOT NULL REFERENCES accounts(id),
    line_number INTEGER NOT NULL,
    debit_amount NUMERIC(19, 2) NOT NULL DEFAULT 0,
    credit_amount NUMERIC(19, 2) NOT NULL DEFAULT 0,
    description TEXT NOT NULL DEFAULT '',

    -- exactly one side carries a positive amount
    CONSTRAINT chk_line_one_side CHECK (
        (debit_amount > 0 AND credit_amount = 0) OR
        (credit_amount > 0 AND debit_amount = 0)
    ),
    UNIQUE (journal_id, line_number)
);

CREATE INDEX idx_journal_lines_account ON journal_lines(account_id);
";

const ACCOUNTING_PERIODS_SQL: &str = r"
CREATE EXTENSION IF NOT EXISTS btree_gist;

CREATE TABLE accounting_periods (
    id UUID PRIMARY KEY,
    name VARCHAR(100) NOT NULL,
    start_date DATE NOT NULL,
    end_date DATE NOT NULL,
    is_closed BOOLEAN NOT NULL DEFAULT false,
    total_revenue NUMERIC(19, 2) NOT NULL DEFAULT 0,
    total_expense NUMERIC(19, 2) NOT NULL DEFAULT 0,
    net_income NUMERIC(19, 2) NOT NULL DEFAULT 0,
    closing_journal_id UUID REFERENCES journal_entries(id),
    closed_by UUID,
    closed_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    CONSTRAINT chk_period_range CHECK (start_date <= end_date),
    CONSTRAINT excl_period_overlap EXCLUDE USING gist (daterange(start_date, end_date, '[]') WITH &&)
);

CREATE INDEX idx_accounting_periods_start ON accounting_periods(start_date);
";

const DROP_ALL_SQL: &str = r"
DROP TABLE IF EXISTS accounting_periods CASCADE;
DROP TABLE IF EXISTS journal_lines CASCADE;
DROP TABLE IF EXISTS journal_entries CASCADE;
DROP SEQUENCE IF EXISTS journal_entry_code_seq;
DROP TABLE IF EXISTS accounts CASCADE;

DROP TYPE IF EXISTS source_type CASCADE;
DROP TYPE IF EXISTS entry_status CASCADE;
DROP TYPE IF EXISTS account_type CASCADE;
";
