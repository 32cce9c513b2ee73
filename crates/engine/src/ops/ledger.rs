//! Posting protocol.
//!
//! Every posting is one unit: detail row, entry row(s), then a relative
//! balance increment per entry. Nothing is visible until the unit commits.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DbErr, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait, prelude::*, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    AccountStatus, Entry, Entryable, EngineError, EntryDraft, Money, Principal, ResultEngine,
    Trade, TradeDraft, Transaction, TransactionDraft, TransactionKind, accounts, entries,
    securities, trades, transactions,
    util::{model_currency, parse_uuid, required_name},
};

use super::{Engine, is_unique_violation, with_tx};

/// Identities produced by a standard posting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PostedTransaction {
    pub entry_id: Uuid,
    pub transaction_id: Uuid,
    /// An entry with the same external id already existed; nothing was written.
    pub replayed: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PostedTransfer {
    pub from_entry_id: Uuid,
    pub to_entry_id: Uuid,
    pub transaction_id: Uuid,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PostedTrade {
    pub entry_id: Uuid,
    pub trade_id: Uuid,
    pub replayed: bool,
}

struct PreparedEntry {
    entry: Entry,
    amount: Money,
}

fn external_key(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Validates a draft against its account and fixes its identity.
fn prepare_entry(
    draft: EntryDraft,
    account: &accounts::Model,
    entryable: Entryable,
    created_at: DateTime<Utc>,
) -> ResultEngine<PreparedEntry> {
    if account.status != AccountStatus::Active.as_str() {
        return Err(EngineError::Validation(format!(
            "account {} is archived",
            account.id
        )));
    }
    let currency = model_currency(&account.currency)?;
    if let Some(requested) = draft.currency.filter(|c| *c != currency) {
        return Err(EngineError::Validation(format!(
            "entry currency {requested} does not match account currency {currency}"
        )));
    }
    let amount = Money::from_decimal(draft.amount, currency)?;
    let (name, _) = required_name(&draft.name, "entry")?;
    Ok(PreparedEntry {
        entry: Entry {
            id: draft.id.unwrap_or_else(Uuid::new_v4),
            account_id: draft.account_id,
            amount: amount.to_decimal(),
            currency,
            date: draft.date,
            name,
            entryable,
            external_id: external_key(draft.external_id.as_deref()),
            created_at,
        },
        amount,
    })
}

fn conflict_on_duplicate(err: DbErr, what: String) -> EngineError {
    if is_unique_violation(&err) {
        EngineError::Conflict(what)
    } else {
        err.into()
    }
}

/// `UPDATE accounts SET balance_minor = balance_minor + ? WHERE id = ?`
pub(super) async fn increment_balance<C: ConnectionTrait>(
    db: &C,
    account_id: Uuid,
    amount: Money,
) -> ResultEngine<()> {
    let result = accounts::Entity::update_many()
        .col_expr(
            accounts::Column::BalanceMinor,
            Expr::col(accounts::Column::BalanceMinor).add(amount.minor()),
        )
        .filter(accounts::Column::Id.eq(account_id.to_string()))
        .exec(db)
        .await?;
    if result.rows_affected != 1 {
        return Err(EngineError::NotFound(format!("account {account_id}")));
    }
    Ok(())
}

/// Inserts the entry row and applies its amount to the account balance.
///
/// A duplicate on an entry without external id is a conflict. With an
/// external id the raw error is kept so the caller can resolve the race.
async fn insert_entry<C: ConnectionTrait>(db: &C, prepared: &PreparedEntry) -> ResultEngine<()> {
    let replayable = prepared.entry.external_id.is_some();
    entries::active_model(&prepared.entry, prepared.amount)
        .insert(db)
        .await
        .map_err(|err| {
            if replayable {
                err.into()
            } else {
                conflict_on_duplicate(err, format!("entry {}", prepared.entry.id))
            }
        })?;
    increment_balance(db, prepared.entry.account_id, prepared.amount).await
}

async fn entry_by_external_id<C: ConnectionTrait>(
    db: &C,
    account_id: Uuid,
    external_id: &str,
) -> ResultEngine<Option<entries::Model>> {
    entries::Entity::find()
        .filter(entries::Column::AccountId.eq(account_id.to_string()))
        .filter(entries::Column::ExternalId.eq(external_id))
        .one(db)
        .await
        .map_err(Into::into)
}

fn replayed_transaction(model: entries::Model) -> ResultEngine<PostedTransaction> {
    match model.entryable()? {
        Entryable::Transaction(transaction_id) => Ok(PostedTransaction {
            entry_id: parse_uuid(&model.id, "entry")?,
            transaction_id,
            replayed: true,
        }),
        other => Err(EngineError::Conflict(format!(
            "external id already used by a {} entry",
            other.kind().as_str()
        ))),
    }
}

fn replayed_trade(model: entries::Model) -> ResultEngine<PostedTrade> {
    match model.entryable()? {
        Entryable::Trade(trade_id) => Ok(PostedTrade {
            entry_id: parse_uuid(&model.id, "entry")?,
            trade_id,
            replayed: true,
        }),
        other => Err(EngineError::Conflict(format!(
            "external id already used by a {} entry",
            other.kind().as_str()
        ))),
    }
}

/// Transfer legs: source debited, destination credited, and equal in size
/// when both accounts share a currency.
fn check_transfer_amounts(from: Money, to: Money) -> ResultEngine<()> {
    if !(from.is_negative() && to.is_positive()) {
        return Err(EngineError::Validation(
            "transfer must debit the source and credit the destination".to_string(),
        ));
    }
    if from.currency() == to.currency() && to.minor() != -from.minor() {
        return Err(EngineError::Validation(format!(
            "transfer legs do not balance: {from} and {to}"
        )));
    }
    Ok(())
}

impl Engine {
    /// Post a standard transaction: one detail, one entry, one balance change.
    ///
    /// With an external id, a second posting for the same account returns the
    /// identities of the first one flagged as replayed.
    pub async fn post_transaction(
        &self,
        principal: &Principal,
        entry: EntryDraft,
        detail: TransactionDraft,
    ) -> ResultEngine<PostedTransaction> {
        if detail.kind != TransactionKind::Standard {
            return Err(EngineError::Validation(
                "transfers must be posted with post_transfer".to_string(),
            ));
        }
        let account_id = entry.account_id;
        let external_id = external_key(entry.external_id.as_deref());
        let result = self.post_transaction_unit(principal, entry, detail).await;
        let posted = self
            .settle_race(result, account_id, external_id.as_deref(), replayed_transaction)
            .await?;
        if posted.replayed {
            tracing::debug!(%account_id, entry_id = %posted.entry_id, "transaction replayed");
        } else {
            tracing::info!(%account_id, entry_id = %posted.entry_id, "transaction posted");
        }
        Ok(posted)
    }

    async fn post_transaction_unit(
        &self,
        principal: &Principal,
        entry: EntryDraft,
        detail: TransactionDraft,
    ) -> ResultEngine<PostedTransaction> {
        let external_id = external_key(entry.external_id.as_deref());
        with_tx!(self, |db_tx| {
            let account = self
                .require_account(&db_tx, principal, entry.account_id)
                .await?;
            if let Some(external_id) = external_id.as_deref() {
                if let Some(existing) =
                    entry_by_external_id(&db_tx, entry.account_id, external_id).await?
                {
                    return replayed_transaction(existing);
                }
            }
            if let Some(category_id) = detail.category_id {
                if !self
                    .category_exists_for_family(&db_tx, principal, category_id)
                    .await?
                {
                    return Err(EngineError::Validation(format!(
                        "unknown category {category_id}"
                    )));
                }
            }
            if let Some(merchant_id) = detail.merchant_id {
                if !self
                    .merchant_exists_for_family(&db_tx, principal, merchant_id)
                    .await?
                {
                    return Err(EngineError::Validation(format!(
                        "unknown merchant {merchant_id}"
                    )));
                }
            }

            let now = Utc::now();
            let transaction = Transaction {
                id: detail.id.unwrap_or_else(Uuid::new_v4),
                category_id: detail.category_id,
                merchant_id: detail.merchant_id,
                kind: TransactionKind::Standard,
                created_at: now,
            };
            let prepared = prepare_entry(
                entry,
                &account,
                Entryable::Transaction(transaction.id),
                now,
            )?;

            transactions::ActiveModel::from(&transaction)
                .insert(&db_tx)
                .await
                .map_err(|err| {
                    conflict_on_duplicate(err, format!("transaction {}", transaction.id))
                })?;
            insert_entry(&db_tx, &prepared).await?;

            Ok(PostedTransaction {
                entry_id: prepared.entry.id,
                transaction_id: transaction.id,
                replayed: false,
            })
        })
    }

    /// Post a transfer: one shared detail of kind transfer, two entries.
    ///
    /// Both accounts must belong to the principal's family and differ.
    pub async fn post_transfer(
        &self,
        principal: &Principal,
        from: EntryDraft,
        to: EntryDraft,
    ) -> ResultEngine<PostedTransfer> {
        if from.account_id == to.account_id {
            return Err(EngineError::Validation(
                "transfer accounts must differ".to_string(),
            ));
        }
        let posted = with_tx!(self, |db_tx| {
            let from_account = self.require_account(&db_tx, principal, from.account_id).await?;
            let to_account = self.require_account(&db_tx, principal, to.account_id).await?;

            let now = Utc::now();
            let transaction = Transaction {
                id: Uuid::new_v4(),
                category_id: None,
                merchant_id: None,
                kind: TransactionKind::Transfer,
                created_at: now,
            };
            let entryable = Entryable::Transaction(transaction.id);
            let from_entry = prepare_entry(from, &from_account, entryable, now)?;
            let to_entry = prepare_entry(to, &to_account, entryable, now)?;
            check_transfer_amounts(from_entry.amount, to_entry.amount)?;

            transactions::ActiveModel::from(&transaction)
                .insert(&db_tx)
                .await
                .map_err(|err| {
                    conflict_on_duplicate(err, format!("transaction {}", transaction.id))
                })?;
            for prepared in [&from_entry, &to_entry] {
                entries::active_model(&prepared.entry, prepared.amount)
                    .insert(&db_tx)
                    .await
                    .map_err(|err| {
                        conflict_on_duplicate(err, format!("entry {}", prepared.entry.id))
                    })?;
                increment_balance(&db_tx, prepared.entry.account_id, prepared.amount).await?;
            }

            Ok::<_, EngineError>(PostedTransfer {
                from_entry_id: from_entry.entry.id,
                to_entry_id: to_entry.entry.id,
                transaction_id: transaction.id,
            })
        })?;
        tracing::info!(transaction_id = %posted.transaction_id, "transfer posted");
        Ok(posted)
    }

    /// Post an investment trade.
    ///
    /// The entry amount must equal the trade's signed cash effect in the
    /// account currency.
    pub async fn post_trade(
        &self,
        principal: &Principal,
        entry: EntryDraft,
        trade: TradeDraft,
    ) -> ResultEngine<PostedTrade> {
        let account_id = entry.account_id;
        let external_id = external_key(entry.external_id.as_deref());
        let result = self.post_trade_unit(principal, entry, trade).await;
        let posted = self
            .settle_race(result, account_id, external_id.as_deref(), replayed_trade)
            .await?;
        if posted.replayed {
            tracing::debug!(%account_id, entry_id = %posted.entry_id, "trade replayed");
        } else {
            tracing::info!(%account_id, trade_id = %posted.trade_id, "trade posted");
        }
        Ok(posted)
    }

    async fn post_trade_unit(
        &self,
        principal: &Principal,
        entry: EntryDraft,
        draft: TradeDraft,
    ) -> ResultEngine<PostedTrade> {
        let mut trade = Trade::new(draft.security_id, draft.qty, draft.price, draft.kind)?;
        if let Some(id) = draft.id {
            trade.id = id;
        }
        let external_id = external_key(entry.external_id.as_deref());
        with_tx!(self, |db_tx| {
            let account = self
                .require_account(&db_tx, principal, entry.account_id)
                .await?;
            if let Some(external_id) = external_id.as_deref() {
                if let Some(existing) =
                    entry_by_external_id(&db_tx, entry.account_id, external_id).await?
                {
                    return replayed_trade(existing);
                }
            }
            let security_exists = securities::Entity::find_by_id(trade.security_id.to_string())
                .one(&db_tx)
                .await?
                .is_some();
            if !security_exists {
                return Err(EngineError::NotFound(format!(
                    "security {}",
                    trade.security_id
                )));
            }

            let currency = model_currency(&account.currency)?;
            let expected = trade.signed_amount(currency)?;
            let prepared = prepare_entry(entry, &account, Entryable::Trade(trade.id), trade.created_at)?;
            if prepared.amount != expected {
                return Err(EngineError::Validation(format!(
                    "entry amount {} does not match trade value {expected}",
                    prepared.amount
                )));
            }

            trades::ActiveModel::from(&trade)
                .insert(&db_tx)
                .await
                .map_err(|err| conflict_on_duplicate(err, format!("trade {}", trade.id)))?;
            insert_entry(&db_tx, &prepared).await?;

            Ok(PostedTrade {
                entry_id: prepared.entry.id,
                trade_id: trade.id,
                replayed: false,
            })
        })
    }

    /// Turns a lost race on `(account_id, external_id)` into a replay.
    ///
    /// The failed unit has already rolled back; the winner's entry is read
    /// back outside of it.
    async fn settle_race<T>(
        &self,
        result: ResultEngine<T>,
        account_id: Uuid,
        external_id: Option<&str>,
        replay: fn(entries::Model) -> ResultEngine<T>,
    ) -> ResultEngine<T> {
        match (result, external_id) {
            (Err(EngineError::Database(err)), Some(external_id)) if is_unique_violation(&err) => {
                match entry_by_external_id(&self.database, account_id, external_id).await? {
                    Some(existing) => {
                        tracing::debug!(%account_id, external_id, "concurrent posting resolved as replay");
                        replay(existing)
                    }
                    None => Err(EngineError::Conflict(format!(
                        "entry for account {account_id}"
                    ))),
                }
            }
            (result, _) => result,
        }
    }

    /// Entries of one account, newest first.
    pub async fn list_entries(
        &self,
        principal: &Principal,
        account_id: Uuid,
    ) -> ResultEngine<Vec<Entry>> {
        self.require_account(&self.database, principal, account_id)
            .await?;
        entries::Entity::find()
            .filter(entries::Column::AccountId.eq(account_id.to_string()))
            .order_by_desc(entries::Column::Date)
            .order_by_desc(entries::Column::CreatedAt)
            .order_by_desc(entries::Column::Id)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Entry::try_from)
            .collect()
    }

    /// Sum of the entry amounts of an account.
    ///
    /// Always equal to the account balance; exposed to audit that.
    pub async fn ledger_sum(&self, principal: &Principal, account_id: Uuid) -> ResultEngine<Decimal> {
        let account = self
            .require_account(&self.database, principal, account_id)
            .await?;
        let currency = model_currency(&account.currency)?;
        let amounts: Vec<i64> = entries::Entity::find()
            .select_only()
            .column(entries::Column::AmountMinor)
            .filter(entries::Column::AccountId.eq(account_id.to_string()))
            .into_tuple()
            .all(&self.database)
            .await?;
        let total = amounts
            .into_iter()
            .try_fold(0_i64, i64::checked_add)
            .ok_or_else(|| EngineError::Validation("ledger sum overflow".to_string()))?;
        Ok(Money::new(total, currency).to_decimal())
    }
}
