//! The module contains `Account` struct and its persistence model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Currency, EngineError, Money,
    util::{model_currency, parse_uuid},
};

/// Sign of an account in net-worth aggregation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Asset,
    Liability,
}

impl Classification {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::Liability => "liability",
        }
    }

    /// Classification implied by an account subtype when none is given.
    ///
    /// Credit cards and loans are liabilities, everything else is an asset.
    #[must_use]
    pub fn for_subtype(subtype: Option<&str>) -> Self {
        match subtype.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("credit_card" | "loan" | "mortgage") => Self::Liability,
            _ => Self::Asset,
        }
    }
}

impl TryFrom<&str> for Classification {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "asset" => Ok(Self::Asset),
            "liability" => Ok(Self::Liability),
            other => Err(EngineError::Validation(format!(
                "invalid classification: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    #[default]
    Active,
    Archived,
}

impl AccountStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
        }
    }
}

impl TryFrom<&str> for AccountStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "active" => Ok(Self::Active),
            "archived" => Ok(Self::Archived),
            other => Err(EngineError::Validation(format!(
                "invalid account status: {other}"
            ))),
        }
    }
}

/// An account owned by a family.
///
/// `balance` is a materialized running total: it always equals the sum of the
/// amounts of the entries posted against the account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub family_id: Uuid,
    pub name: String,
    pub subtype: Option<String>,
    pub classification: Classification,
    pub balance: Decimal,
    pub currency: Currency,
    pub status: AccountStatus,
    /// Account identifier used by the external feed, if the account is linked.
    pub external_account_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub family_id: String,
    pub name: String,
    pub subtype: Option<String>,
    pub classification: String,
    pub balance_minor: i64,
    pub currency: String,
    pub status: String,
    pub external_account_id: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::entries::Entity")]
    Entries,
}

impl Related<super::entries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Entries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Account> for ActiveModel {
    /// The balance is always inserted as 0; opening balances are posted as
    /// entries so the ledger sum stays equal to the balance.
    fn from(value: &Account) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            family_id: ActiveValue::Set(value.family_id.to_string()),
            name: ActiveValue::Set(value.name.clone()),
            subtype: ActiveValue::Set(value.subtype.clone()),
            classification: ActiveValue::Set(value.classification.as_str().to_string()),
            balance_minor: ActiveValue::Set(0),
            currency: ActiveValue::Set(value.currency.code().to_string()),
            status: ActiveValue::Set(value.status.as_str().to_string()),
            external_account_id: ActiveValue::Set(value.external_account_id.clone()),
            created_at: ActiveValue::Set(value.created_at),
        }
    }
}

impl TryFrom<Model> for Account {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let currency = model_currency(&model.currency)?;
        Ok(Self {
            id: parse_uuid(&model.id, "account")?,
            family_id: parse_uuid(&model.family_id, "family")?,
            name: model.name,
            subtype: model.subtype,
            classification: Classification::try_from(model.classification.as_str())?,
            balance: Money::new(model.balance_minor, currency).to_decimal(),
            currency,
            status: AccountStatus::try_from(model.status.as_str())?,
            external_account_id: model.external_account_id,
            created_at: model.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn liabilities_inferred_from_subtype() {
        assert_eq!(
            Classification::for_subtype(Some("credit_card")),
            Classification::Liability
        );
        assert_eq!(Classification::for_subtype(Some("Loan")), Classification::Liability);
        assert_eq!(Classification::for_subtype(Some("checking")), Classification::Asset);
        assert_eq!(Classification::for_subtype(None), Classification::Asset);
    }

    #[test]
    fn model_balance_is_scaled_by_currency() {
        let model = Model {
            id: Uuid::new_v4().to_string(),
            family_id: Uuid::new_v4().to_string(),
            name: "Checking".to_string(),
            subtype: Some("checking".to_string()),
            classification: "asset".to_string(),
            balance_minor: 123_456,
            currency: "USD".to_string(),
            status: "active".to_string(),
            external_account_id: None,
            created_at: Utc::now(),
        };
        let account = Account::try_from(model).unwrap();
        assert_eq!(account.balance, Decimal::new(123_456, 2));
        assert!(account.is_active());
    }
}
