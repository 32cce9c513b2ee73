//! Reconciliation of an external transaction feed against the ledger.
//!
//! A reconciliation pulls pages from a cursor-based feed and posts every
//! added transaction as a standard posting keyed by its external id. The
//! cursor only moves after a whole page is applied, so a failed run resumes
//! at the same page and the external id turns already-applied items into
//! replays.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    Currency, Engine, EngineError, EntryDraft, Principal, ResultEngine, SourceStatus,
    TransactionDraft,
};

mod cipher;
mod dispatcher;
mod plaid;
mod retry;

pub use cipher::{CipherError, TokenCipher};
pub use dispatcher::{SyncHandler, SyncQueue, SyncWorker};
pub use plaid::{FeedError, PlaidEnvironment, PlaidFeed};
pub use retry::RetryPolicy;

/// One transaction as reported by the feed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalTransaction {
    pub external_transaction_id: String,
    pub external_account_id: String,
    pub amount: Decimal,
    /// `YYYY-MM-DD`
    pub date: String,
    pub description: String,
    pub currency_code: Option<String>,
    pub merchant_name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeedPage {
    pub added: Vec<ExternalTransaction>,
    pub next_cursor: String,
    pub has_more: bool,
}

/// Cursor-based source of external transactions.
#[async_trait]
pub trait FeedProvider: Send + Sync {
    /// Page following `cursor`; `None` starts from the beginning.
    async fn fetch_page(&self, access_token: &str, cursor: Option<&str>) -> ResultEngine<FeedPage>;
}

/// Payload of a reconciliation task.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTask {
    pub family_id: Uuid,
    pub item_id: String,
}

impl SyncTask {
    pub fn new(family_id: Uuid, item_id: impl Into<String>) -> Self {
        Self {
            family_id,
            item_id: item_id.into(),
        }
    }

    pub fn from_payload(payload: &[u8]) -> ResultEngine<Self> {
        let task: Self = serde_json::from_slice(payload)
            .map_err(|err| EngineError::MalformedPayload(err.to_string()))?;
        if task.item_id.trim().is_empty() {
            return Err(EngineError::MalformedPayload("empty item_id".to_string()));
        }
        Ok(task)
    }

    pub fn to_payload(&self) -> ResultEngine<Vec<u8>> {
        serde_json::to_vec(self).map_err(|err| EngineError::MalformedPayload(err.to_string()))
    }
}

/// Outcome of one reconciliation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub pages: usize,
    pub posted: usize,
    /// Items already present in the ledger.
    pub replayed: usize,
    /// Items for accounts that are not linked (or archived), or in a currency
    /// the account does not hold.
    pub skipped: usize,
    pub cursor: Option<String>,
}

enum Applied {
    Posted,
    Replayed,
    Skipped,
}

/// Runs reconciliations, at most one at a time per linked source.
pub struct Reconciler {
    engine: Arc<Engine>,
    feed: Arc<dyn FeedProvider>,
    locks: DashMap<String, Arc<Mutex<()>>>,
    max_pages: usize,
}

impl Reconciler {
    pub fn new(engine: Arc<Engine>, feed: Arc<dyn FeedProvider>) -> Self {
        Self {
            engine,
            feed,
            locks: DashMap::new(),
            max_pages: 50,
        }
    }

    /// Upper bound of pages applied by one invocation.
    #[must_use]
    pub fn max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Reconcile the linked source named by `task`.
    ///
    /// Concurrent calls for the same item are serialized; the source is read
    /// after the lock is taken so each run starts from the cursor its
    /// predecessor left behind.
    pub async fn reconcile(&self, task: &SyncTask) -> ResultEngine<SyncReport> {
        let lock = Arc::clone(
            &self
                .locks
                .entry(task.item_id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        );
        let result = {
            let _guard = lock.lock().await;
            self.reconcile_locked(task).await
        };
        // Held by the map and by us only: no run is waiting on this item.
        self.locks
            .remove_if(&task.item_id, |_, held| Arc::strong_count(held) == 2);
        result
    }

    async fn reconcile_locked(&self, task: &SyncTask) -> ResultEngine<SyncReport> {
        let principal = Principal::sync(task.family_id, task.item_id.clone());
        let source = self
            .engine
            .linked_source_by_item(&principal, &task.item_id)
            .await?;
        if source.status == SourceStatus::RequiresRelink {
            return Err(EngineError::Credential(format!(
                "linked source {} requires relink",
                task.item_id
            )));
        }
        let access_token = match self.engine.open_access_token(&source) {
            Ok(token) => token,
            Err(err) => return Err(self.relink(&principal, &task.item_id, err).await),
        };

        let mut cursor = source.sync_cursor;
        let mut report = SyncReport {
            cursor: cursor.clone(),
            ..SyncReport::default()
        };
        loop {
            let page = match self.feed.fetch_page(&access_token, cursor.as_deref()).await {
                Ok(page) => page,
                Err(err @ EngineError::Credential(_)) => {
                    return Err(self.relink(&principal, &task.item_id, err).await);
                }
                Err(err) => return Err(err),
            };

            for tx in &page.added {
                match self.apply(&principal, tx).await? {
                    Applied::Posted => report.posted += 1,
                    Applied::Replayed => report.replayed += 1,
                    Applied::Skipped => report.skipped += 1,
                }
            }

            self.engine
                .advance_cursor(&principal, &task.item_id, cursor.as_deref(), &page.next_cursor)
                .await?;
            report.pages += 1;
            cursor = Some(page.next_cursor);
            report.cursor = cursor.clone();

            if !page.has_more {
                break;
            }
            if report.pages >= self.max_pages {
                tracing::info!(item_id = %task.item_id, pages = report.pages, "page limit reached, more data pending");
                break;
            }
        }

        tracing::info!(
            item_id = %task.item_id,
            pages = report.pages,
            posted = report.posted,
            replayed = report.replayed,
            skipped = report.skipped,
            "reconciliation finished"
        );
        Ok(report)
    }

    async fn relink(&self, principal: &Principal, item_id: &str, err: EngineError) -> EngineError {
        if let Err(mark_err) = self.engine.mark_requires_relink(principal, item_id).await {
            tracing::error!(%item_id, "failed to flag linked source: {mark_err}");
        }
        err
    }

    async fn apply(&self, principal: &Principal, tx: &ExternalTransaction) -> ResultEngine<Applied> {
        let account = match self
            .engine
            .account_by_external_id(principal, &tx.external_account_id)
            .await?
        {
            Some(account) if account.is_active() => account,
            _ => {
                tracing::warn!(
                    external_account_id = %tx.external_account_id,
                    external_transaction_id = %tx.external_transaction_id,
                    "no active account for external transaction, skipping"
                );
                return Ok(Applied::Skipped);
            }
        };

        let date = NaiveDate::parse_from_str(tx.date.trim(), "%Y-%m-%d").map_err(|_| {
            EngineError::Validation(format!(
                "invalid date {:?} for transaction {}",
                tx.date, tx.external_transaction_id
            ))
        })?;
        let currency = match tx.currency_code.as_deref().filter(|c| !c.trim().is_empty()) {
            None => account.currency,
            Some(code) => match Currency::try_from(code) {
                Ok(currency) if currency == account.currency => currency,
                _ => {
                    tracing::warn!(
                        account_id = %account.id,
                        currency = %code,
                        external_transaction_id = %tx.external_transaction_id,
                        "feed currency does not match account currency, skipping"
                    );
                    return Ok(Applied::Skipped);
                }
            },
        };

        let merchant_id = match tx.merchant_name.as_deref().filter(|n| !n.trim().is_empty()) {
            Some(name) => match self.engine.get_or_create_merchant(principal, name).await {
                Ok(id) => Some(id),
                Err(err) => {
                    tracing::warn!(merchant = %name, "merchant resolution failed, posting without merchant: {err}");
                    None
                }
            },
            None => None,
        };

        let name = if tx.description.trim().is_empty() {
            tx.external_transaction_id.as_str()
        } else {
            tx.description.as_str()
        };
        let entry = EntryDraft::new(account.id, tx.amount, date, name)
            .currency(currency)
            .external_id(tx.external_transaction_id.clone());
        let mut detail = TransactionDraft::standard();
        if let Some(merchant_id) = merchant_id {
            detail = detail.merchant_id(merchant_id);
        }

        let posted = self.engine.post_transaction(principal, entry, detail).await?;
        Ok(if posted.replayed {
            Applied::Replayed
        } else {
            Applied::Posted
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::MigratorTrait;

    struct EmptyFeed;

    #[async_trait]
    impl FeedProvider for EmptyFeed {
        async fn fetch_page(&self, _: &str, cursor: Option<&str>) -> ResultEngine<FeedPage> {
            Ok(FeedPage {
                next_cursor: cursor.unwrap_or_default().to_string(),
                ..FeedPage::default()
            })
        }
    }

    #[tokio::test]
    async fn finished_runs_release_their_lock() {
        let db = sea_orm::Database::connect("sqlite::memory:").await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        let engine = Engine::builder().database(db).build().await.unwrap();
        let reconciler = Reconciler::new(Arc::new(engine), Arc::new(EmptyFeed));

        for item in ["item-a", "item-b", "item-a"] {
            let err = reconciler
                .reconcile(&SyncTask::new(Uuid::new_v4(), item))
                .await
                .unwrap_err();
            assert!(matches!(err, EngineError::NotFound(_)));
        }
        assert!(reconciler.locks.is_empty());
    }

    #[test]
    fn payload_round_trip() {
        let task = SyncTask::new(Uuid::new_v4(), "item-1");
        let payload = task.to_payload().unwrap();
        assert_eq!(SyncTask::from_payload(&payload).unwrap(), task);
    }

    #[test]
    fn malformed_payload_is_permanent() {
        let err = SyncTask::from_payload(b"{\"family_id\": 3}").unwrap_err();
        assert!(matches!(err, EngineError::MalformedPayload(_)));
        assert!(!err.is_retriable());

        let blank = format!(r#"{{"family_id":"{}","item_id":"  "}}"#, Uuid::new_v4());
        assert!(matches!(
            SyncTask::from_payload(blank.as_bytes()),
            Err(EngineError::MalformedPayload(_))
        ));
    }
}
