use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};
use uuid::Uuid;

use crate::{
    Account, AccountStatus, Classification, EngineError, Entry, Entryable, Money,
    NewAccountCmd, Principal, ResultEngine, Valuation, accounts, entries,
    util::{normalize_optional_text, required_name},
    valuations,
};

use super::{Engine, is_unique_violation, ledger::increment_balance, with_tx};

/// Name of the synthetic entry carrying an opening balance.
pub const INITIAL_BALANCE: &str = "Initial Balance";

impl Engine {
    /// Create an account in the principal's family.
    ///
    /// A non-zero opening balance is posted in the same unit as an
    /// `"Initial Balance"` entry backed by an opening valuation, so the
    /// balance is still the sum of the account's entries.
    pub async fn create_account(
        &self,
        principal: &Principal,
        cmd: NewAccountCmd,
    ) -> ResultEngine<Uuid> {
        let (name, _) = required_name(&cmd.name, "account")?;
        let subtype = normalize_optional_text(cmd.subtype.as_deref());
        let classification = cmd
            .classification
            .unwrap_or_else(|| Classification::for_subtype(subtype.as_deref()));
        let opening = Money::from_decimal(cmd.opening_balance, cmd.currency)?;
        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            family_id: principal.family_id,
            name,
            subtype,
            classification,
            balance: Decimal::ZERO,
            currency: cmd.currency,
            status: AccountStatus::Active,
            external_account_id: cmd
                .external_account_id
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string),
            created_at: now,
        };

        with_tx!(self, |db_tx| {
            if let Some(external) = account.external_account_id.as_deref() {
                if self
                    .account_by_external_id_in(&db_tx, principal, external)
                    .await?
                    .is_some()
                {
                    return Err(EngineError::Conflict(format!(
                        "external account {external}"
                    )));
                }
            }
            accounts::ActiveModel::from(&account)
                .insert(&db_tx)
                .await
                .map_err(|err| {
                    if is_unique_violation(&err) {
                        EngineError::Conflict(format!("account {}", account.name))
                    } else {
                        err.into()
                    }
                })?;

            if !opening.is_zero() {
                let valuation = Valuation::opening();
                valuations::ActiveModel::from(&valuation)
                    .insert(&db_tx)
                    .await?;
                let entry = Entry {
                    id: Uuid::new_v4(),
                    account_id: account.id,
                    amount: opening.to_decimal(),
                    currency: account.currency,
                    date: cmd.opening_date.unwrap_or_else(|| now.date_naive()),
                    name: INITIAL_BALANCE.to_string(),
                    entryable: Entryable::Valuation(valuation.id),
                    external_id: None,
                    created_at: now,
                };
                entries::active_model(&entry, opening)
                    .insert(&db_tx)
                    .await?;
                increment_balance(&db_tx, account.id, opening).await?;
            }

            tracing::info!(
                account_id = %account.id,
                family_id = %account.family_id,
                opening = %opening,
                "account created"
            );
            Ok(account.id)
        })
    }

    /// Single account of the principal's family.
    pub async fn account(&self, principal: &Principal, account_id: Uuid) -> ResultEngine<Account> {
        let model = self
            .require_account(&self.database, principal, account_id)
            .await?;
        Account::try_from(model)
    }

    /// Active accounts ordered by creation.
    pub async fn list_active_accounts(&self, principal: &Principal) -> ResultEngine<Vec<Account>> {
        accounts::Entity::find()
            .filter(accounts::Column::FamilyId.eq(principal.family_id.to_string()))
            .filter(accounts::Column::Status.eq(AccountStatus::Active.as_str()))
            .order_by_asc(accounts::Column::CreatedAt)
            .order_by_asc(accounts::Column::Id)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Account::try_from)
            .collect()
    }

    /// Assets minus liabilities over the active accounts.
    ///
    /// Balances are summed as-is whatever their currency.
    pub async fn net_worth(&self, principal: &Principal) -> ResultEngine<Decimal> {
        let accounts = self.list_active_accounts(principal).await?;
        Ok(accounts
            .iter()
            .fold(Decimal::ZERO, |total, account| match account.classification {
                Classification::Asset => total + account.balance,
                Classification::Liability => total - account.balance,
            }))
    }

    /// Account linked to `external_account_id`, if any.
    pub async fn account_by_external_id(
        &self,
        principal: &Principal,
        external_account_id: &str,
    ) -> ResultEngine<Option<Account>> {
        self.account_by_external_id_in(&self.database, principal, external_account_id)
            .await?
            .map(Account::try_from)
            .transpose()
    }

    async fn account_by_external_id_in<C: sea_orm::ConnectionTrait>(
        &self,
        db: &C,
        principal: &Principal,
        external_account_id: &str,
    ) -> ResultEngine<Option<accounts::Model>> {
        accounts::Entity::find()
            .filter(accounts::Column::FamilyId.eq(principal.family_id.to_string()))
            .filter(accounts::Column::ExternalAccountId.eq(external_account_id))
            .one(db)
            .await
            .map_err(Into::into)
    }

    /// Archived accounts keep their entries but accept no new postings.
    pub async fn archive_account(&self, principal: &Principal, account_id: Uuid) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_account(&db_tx, principal, account_id).await?;
            let active = accounts::ActiveModel {
                id: ActiveValue::Set(account_id.to_string()),
                status: ActiveValue::Set(AccountStatus::Archived.as_str().to_string()),
                ..Default::default()
            };
            active.update(&db_tx).await?;
            tracing::info!(%account_id, "account archived");
            Ok(())
        })
    }
}
