//! Request and response bodies of the HTTP API.
//!
//! Amounts travel as decimal strings (`"-12.50"`), dates as `YYYY-MM-DD`.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Usd,
    Eur,
    Gbp,
    Cad,
    Aud,
    Jpy,
}

pub mod account {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum Classification {
        Asset,
        Liability,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountNew {
        pub name: String,
        /// `checking`, `savings`, `credit_card`, `loan`, `mortgage`, ...
        pub subtype: Option<String>,
        /// Inferred from `subtype` when omitted.
        pub classification: Option<Classification>,
        pub currency: Currency,
        pub opening_balance: Option<Decimal>,
        pub opening_date: Option<NaiveDate>,
        pub external_account_id: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountCreated {
        pub id: Uuid,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountView {
        pub id: Uuid,
        pub name: String,
        pub subtype: Option<String>,
        pub classification: Classification,
        pub balance: Decimal,
        pub currency: Currency,
        pub external_account_id: Option<String>,
    }

    /// Active accounts of the family and their net worth.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountList {
        pub accounts: Vec<AccountView>,
        pub net_worth: Decimal,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum EntryKind {
        Transaction,
        Trade,
        Valuation,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct EntryView {
        pub id: Uuid,
        pub amount: Decimal,
        pub currency: Currency,
        pub date: NaiveDate,
        pub name: String,
        pub kind: EntryKind,
        /// Id of the transaction, trade or valuation behind the entry.
        pub detail_id: Uuid,
        pub external_id: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct EntryList {
        pub entries: Vec<EntryView>,
    }
}

pub mod transaction {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionNew {
        pub account_id: Uuid,
        /// Signed: negative is money out of the account.
        pub amount: Decimal,
        pub date: NaiveDate,
        pub name: String,
        /// Resolved (or created) by name.
        pub merchant: Option<String>,
        pub category: Option<String>,
        pub external_id: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionCreated {
        pub entry_id: Uuid,
        pub transaction_id: Uuid,
        pub replayed: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransferNew {
        pub from_account_id: Uuid,
        pub to_account_id: Uuid,
        /// Positive amount leaving the source account.
        pub amount: Decimal,
        /// Positive amount reaching the destination; defaults to `amount`.
        /// Only differs when the accounts use different currencies.
        pub received_amount: Option<Decimal>,
        pub date: NaiveDate,
        pub name: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransferCreated {
        pub transaction_id: Uuid,
        pub from_entry_id: Uuid,
        pub to_entry_id: Uuid,
    }
}

pub mod trade {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum TradeKind {
        Buy,
        Sell,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TradeNew {
        pub account_id: Uuid,
        pub ticker: String,
        /// Display name used when the security is first seen.
        pub security_name: Option<String>,
        pub qty: Decimal,
        pub price: Decimal,
        pub kind: TradeKind,
        pub date: NaiveDate,
        pub external_id: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TradeCreated {
        pub entry_id: Uuid,
        pub trade_id: Uuid,
        /// Signed cash effect posted to the account.
        pub amount: Decimal,
        pub replayed: bool,
    }
}

pub mod linked_source {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LinkedSourceNew {
        pub item_id: String,
        pub access_token: String,
        pub institution_id: Option<String>,
        pub institution_name: Option<String>,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum SourceStatus {
        Active,
        RequiresRelink,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LinkedSourceView {
        pub item_id: String,
        pub institution_id: Option<String>,
        pub institution_name: Option<String>,
        pub status: SourceStatus,
        /// `false` until the first page has been applied.
        pub synced: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SyncQueued {
        pub item_id: String,
    }
}
