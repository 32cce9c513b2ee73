//! Household ledger engine.
//!
//! Accounts, immutable entries and their detail records, the posting
//! protocol that keeps every account balance equal to the sum of its
//! entries, and the reconciliation of external bank feeds.

pub use accounts::{Account, AccountStatus, Classification};
pub use categories::Category;
pub use commands::{EntryDraft, NewAccountCmd, NewLinkedSourceCmd, TradeDraft, TransactionDraft};
pub use currency::Currency;
pub use entries::{Entry, Entryable, EntryableKind};
pub use error::EngineError;
pub use linked_sources::{LinkedSource, SourceStatus};
pub use merchants::Merchant;
pub use money::Money;
pub use ops::{Engine, EngineBuilder, INITIAL_BALANCE, PostedTrade, PostedTransaction, PostedTransfer};
pub use principal::{Actor, Principal};
pub use securities::Security;
pub use trades::{Trade, TradeKind};
pub use transactions::{Transaction, TransactionKind};
pub use valuations::{Valuation, ValuationKind};

mod accounts;
mod categories;
mod commands;
mod currency;
mod entries;
mod error;
mod linked_sources;
mod merchants;
mod money;
mod ops;
mod principal;
mod securities;
pub mod sync;
mod trades;
mod transactions;
mod util;
mod valuations;

pub type ResultEngine<T> = Result<T, EngineError>;
