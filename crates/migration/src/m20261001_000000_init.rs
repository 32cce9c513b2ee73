//! Household ledger schema.
//!
//! - `accounts`: balance holders with a cached balance in minor units
//! - `entries`: immutable ledger lines, one per account movement
//! - `transactions`, `trades`, `valuations`: entry details
//! - `merchants`, `categories`: per-family lookup tables
//! - `securities`: tradable instruments, unique by ticker
//! - `linked_sources`: external feed credentials and sync cursors

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Accounts {
    Table,
    Id,
    FamilyId,
    Name,
    Subtype,
    Classification,
    BalanceMinor,
    Currency,
    Status,
    ExternalAccountId,
    CreatedAt,
}

#[derive(Iden)]
enum Merchants {
    Table,
    Id,
    FamilyId,
    Name,
    NameNorm,
    CreatedAt,
}

#[derive(Iden)]
enum Categories {
    Table,
    Id,
    FamilyId,
    Name,
    NameNorm,
}

#[derive(Iden)]
enum Securities {
    Table,
    Id,
    Ticker,
    Name,
    LatestPrice,
    LastUpdated,
}

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    CategoryId,
    MerchantId,
    Kind,
    CreatedAt,
}

#[derive(Iden)]
enum Trades {
    Table,
    Id,
    SecurityId,
    Qty,
    Price,
    Kind,
    CreatedAt,
}

#[derive(Iden)]
enum Valuations {
    Table,
    Id,
    Kind,
    CreatedAt,
}

#[derive(Iden)]
enum Entries {
    Table,
    Id,
    AccountId,
    AmountMinor,
    Currency,
    Date,
    Name,
    EntryableType,
    TransactionId,
    TradeId,
    ValuationId,
    ExternalId,
    CreatedAt,
}

#[derive(Iden)]
enum LinkedSources {
    Table,
    Id,
    FamilyId,
    ItemId,
    AccessToken,
    InstitutionId,
    InstitutionName,
    SyncCursor,
    Status,
    CreatedAt,
    UpdatedAt,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Accounts
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Accounts::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Accounts::FamilyId).string().not_null())
                    .col(ColumnDef::new(Accounts::Name).string().not_null())
                    .col(ColumnDef::new(Accounts::Subtype).string())
                    .col(ColumnDef::new(Accounts::Classification).string().not_null())
                    .col(
                        ColumnDef::new(Accounts::BalanceMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Accounts::Currency).string().not_null())
                    .col(
                        ColumnDef::new(Accounts::Status)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .col(ColumnDef::new(Accounts::ExternalAccountId).string())
                    .col(ColumnDef::new(Accounts::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-accounts-family_id")
                    .table(Accounts::Table)
                    .col(Accounts::FamilyId)
                    .to_owned(),
            )
            .await?;

        // NULL external ids never collide, so manual accounts are unaffected.
        manager
            .create_index(
                Index::create()
                    .name("idx-accounts-family_id-external_account_id")
                    .table(Accounts::Table)
                    .col(Accounts::FamilyId)
                    .col(Accounts::ExternalAccountId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Merchants
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Merchants::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Merchants::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Merchants::FamilyId).string().not_null())
                    .col(ColumnDef::new(Merchants::Name).string().not_null())
                    .col(ColumnDef::new(Merchants::NameNorm).string().not_null())
                    .col(ColumnDef::new(Merchants::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-merchants-family_id-name_norm")
                    .table(Merchants::Table)
                    .col(Merchants::FamilyId)
                    .col(Merchants::NameNorm)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Categories
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Categories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Categories::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Categories::FamilyId).string().not_null())
                    .col(ColumnDef::new(Categories::Name).string().not_null())
                    .col(ColumnDef::new(Categories::NameNorm).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-categories-family_id-name_norm")
                    .table(Categories::Table)
                    .col(Categories::FamilyId)
                    .col(Categories::NameNorm)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Securities
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Securities::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Securities::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Securities::Ticker).string().not_null())
                    .col(ColumnDef::new(Securities::Name).string().not_null())
                    .col(ColumnDef::new(Securities::LatestPrice).string())
                    .col(ColumnDef::new(Securities::LastUpdated).timestamp())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-securities-ticker")
                    .table(Securities::Table)
                    .col(Securities::Ticker)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Transactions (entry detail)
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::CategoryId).string())
                    .col(ColumnDef::new(Transactions::MerchantId).string())
                    .col(
                        ColumnDef::new(Transactions::Kind)
                            .string()
                            .not_null()
                            .default("standard"),
                    )
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-category_id")
                            .from(Transactions::Table, Transactions::CategoryId)
                            .to(Categories::Table, Categories::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-merchant_id")
                            .from(Transactions::Table, Transactions::MerchantId)
                            .to(Merchants::Table, Merchants::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 6. Trades (entry detail)
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Trades::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Trades::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Trades::SecurityId).string().not_null())
                    .col(ColumnDef::new(Trades::Qty).string().not_null())
                    .col(ColumnDef::new(Trades::Price).string().not_null())
                    .col(ColumnDef::new(Trades::Kind).string().not_null())
                    .col(ColumnDef::new(Trades::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-trades-security_id")
                            .from(Trades::Table, Trades::SecurityId)
                            .to(Securities::Table, Securities::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 7. Valuations (entry detail)
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Valuations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Valuations::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Valuations::Kind).string().not_null())
                    .col(
                        ColumnDef::new(Valuations::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 8. Entries
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Entries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Entries::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Entries::AccountId).string().not_null())
                    .col(ColumnDef::new(Entries::AmountMinor).big_integer().not_null())
                    .col(ColumnDef::new(Entries::Currency).string().not_null())
                    .col(ColumnDef::new(Entries::Date).date().not_null())
                    .col(ColumnDef::new(Entries::Name).string().not_null())
                    .col(ColumnDef::new(Entries::EntryableType).string().not_null())
                    .col(ColumnDef::new(Entries::TransactionId).string())
                    .col(ColumnDef::new(Entries::TradeId).string())
                    .col(ColumnDef::new(Entries::ValuationId).string())
                    .col(ColumnDef::new(Entries::ExternalId).string())
                    .col(ColumnDef::new(Entries::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-entries-account_id")
                            .from(Entries::Table, Entries::AccountId)
                            .to(Accounts::Table, Accounts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-entries-transaction_id")
                            .from(Entries::Table, Entries::TransactionId)
                            .to(Transactions::Table, Transactions::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-entries-trade_id")
                            .from(Entries::Table, Entries::TradeId)
                            .to(Trades::Table, Trades::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-entries-valuation_id")
                            .from(Entries::Table, Entries::ValuationId)
                            .to(Valuations::Table, Valuations::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-entries-account_id-date")
                    .table(Entries::Table)
                    .col(Entries::AccountId)
                    .col(Entries::Date)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-entries-account_id-external_id")
                    .table(Entries::Table)
                    .col(Entries::AccountId)
                    .col(Entries::ExternalId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 9. Linked sources
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(LinkedSources::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LinkedSources::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LinkedSources::FamilyId).string().not_null())
                    .col(ColumnDef::new(LinkedSources::ItemId).string().not_null())
                    .col(ColumnDef::new(LinkedSources::AccessToken).string().not_null())
                    .col(ColumnDef::new(LinkedSources::InstitutionId).string())
                    .col(ColumnDef::new(LinkedSources::InstitutionName).string())
                    .col(ColumnDef::new(LinkedSources::SyncCursor).string())
                    .col(
                        ColumnDef::new(LinkedSources::Status)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .col(
                        ColumnDef::new(LinkedSources::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LinkedSources::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-linked_sources-item_id")
                    .table(LinkedSources::Table)
                    .col(LinkedSources::ItemId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Reverse creation order so foreign keys never dangle.
        manager
            .drop_table(Table::drop().table(LinkedSources::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Entries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Valuations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Trades::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Securities::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Categories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Merchants::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await?;
        Ok(())
    }
}
