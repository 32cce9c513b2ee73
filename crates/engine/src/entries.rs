//! Ledger entries.
//!
//! An `Entry` is the immutable unit of change to an account balance. Every
//! entry points at exactly one detail record through its [`Entryable`].

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Currency, EngineError, Money, ResultEngine,
    util::{model_currency, parse_uuid},
};

/// Discriminator stored in `entries.entryable_type`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryableKind {
    Transaction,
    Trade,
    Valuation,
}

impl EntryableKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transaction => "Transaction",
            Self::Trade => "Trade",
            Self::Valuation => "Valuation",
        }
    }
}

impl TryFrom<&str> for EntryableKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "Transaction" => Ok(Self::Transaction),
            "Trade" => Ok(Self::Trade),
            "Valuation" => Ok(Self::Valuation),
            other => Err(EngineError::Validation(format!(
                "invalid entryable type: {other}"
            ))),
        }
    }
}

/// The detail record an entry belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id")]
pub enum Entryable {
    Transaction(Uuid),
    Trade(Uuid),
    Valuation(Uuid),
}

impl Entryable {
    #[must_use]
    pub fn kind(&self) -> EntryableKind {
        match self {
            Self::Transaction(_) => EntryableKind::Transaction,
            Self::Trade(_) => EntryableKind::Trade,
            Self::Valuation(_) => EntryableKind::Valuation,
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        match self {
            Self::Transaction(id) | Self::Trade(id) | Self::Valuation(id) => *id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: Uuid,
    pub account_id: Uuid,
    /// Signed amount in the account currency.
    pub amount: Decimal,
    pub currency: Currency,
    pub date: NaiveDate,
    pub name: String,
    pub entryable: Entryable,
    /// Idempotency key for synced data, unique per account.
    pub external_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub account_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub date: Date,
    pub name: String,
    pub entryable_type: String,
    pub transaction_id: Option<String>,
    pub trade_id: Option<String>,
    pub valuation_id: Option<String>,
    pub external_id: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::AccountId",
        to = "super::accounts::Column::Id"
    )]
    Account,
    #[sea_orm(
        belongs_to = "super::transactions::Entity",
        from = "Column::TransactionId",
        to = "super::transactions::Column::Id"
    )]
    Transaction,
    #[sea_orm(
        belongs_to = "super::trades::Entity",
        from = "Column::TradeId",
        to = "super::trades::Column::Id"
    )]
    Trade,
    #[sea_orm(
        belongs_to = "super::valuations::Entity",
        from = "Column::ValuationId",
        to = "super::valuations::Column::Id"
    )]
    Valuation,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl Related<super::trades::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Trade.def()
    }
}

impl Related<super::valuations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Valuation.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Reads the entryable reference.
    ///
    /// Exactly the FK column named by the discriminator must be set; any
    /// other row shape is reported instead of guessed at.
    pub fn entryable(&self) -> ResultEngine<Entryable> {
        let kind = EntryableKind::try_from(self.entryable_type.as_str())?;
        let malformed = || {
            EngineError::Validation(format!(
                "entry {} has a malformed {} reference",
                self.id,
                kind.as_str()
            ))
        };
        match (
            kind,
            self.transaction_id.as_deref(),
            self.trade_id.as_deref(),
            self.valuation_id.as_deref(),
        ) {
            (EntryableKind::Transaction, Some(id), None, None) => {
                Ok(Entryable::Transaction(parse_uuid(id, "transaction")?))
            }
            (EntryableKind::Trade, None, Some(id), None) => {
                Ok(Entryable::Trade(parse_uuid(id, "trade")?))
            }
            (EntryableKind::Valuation, None, None, Some(id)) => {
                Ok(Entryable::Valuation(parse_uuid(id, "valuation")?))
            }
            _ => Err(malformed()),
        }
    }
}

/// Builds the row for an entry whose amount was already checked against the
/// account currency.
pub(crate) fn active_model(entry: &Entry, amount: Money) -> ActiveModel {
    let entryable = entry.entryable;
    let id_for = |kind: EntryableKind| {
        (entryable.kind() == kind).then(|| entryable.id().to_string())
    };
    ActiveModel {
        id: ActiveValue::Set(entry.id.to_string()),
        account_id: ActiveValue::Set(entry.account_id.to_string()),
        amount_minor: ActiveValue::Set(amount.minor()),
        currency: ActiveValue::Set(amount.currency().code().to_string()),
        date: ActiveValue::Set(entry.date),
        name: ActiveValue::Set(entry.name.clone()),
        entryable_type: ActiveValue::Set(entryable.kind().as_str().to_string()),
        transaction_id: ActiveValue::Set(id_for(EntryableKind::Transaction)),
        trade_id: ActiveValue::Set(id_for(EntryableKind::Trade)),
        valuation_id: ActiveValue::Set(id_for(EntryableKind::Valuation)),
        external_id: ActiveValue::Set(entry.external_id.clone()),
        created_at: ActiveValue::Set(entry.created_at),
    }
}

impl TryFrom<Model> for Entry {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let entryable = model.entryable()?;
        let currency = model_currency(&model.currency)?;
        Ok(Self {
            id: parse_uuid(&model.id, "entry")?,
            account_id: parse_uuid(&model.account_id, "account")?,
            amount: Money::new(model.amount_minor, currency).to_decimal(),
            currency,
            date: model.date,
            name: model.name,
            entryable,
            external_id: model.external_id,
            created_at: model.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(kind: &str, tx: Option<Uuid>, trade: Option<Uuid>) -> Model {
        Model {
            id: Uuid::new_v4().to_string(),
            account_id: Uuid::new_v4().to_string(),
            amount_minor: -1250,
            currency: "USD".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            name: "Coffee".to_string(),
            entryable_type: kind.to_string(),
            transaction_id: tx.map(|id| id.to_string()),
            trade_id: trade.map(|id| id.to_string()),
            valuation_id: None,
            external_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn reads_matching_reference() {
        let id = Uuid::new_v4();
        let entry = Entry::try_from(model("Transaction", Some(id), None)).unwrap();
        assert_eq!(entry.entryable, Entryable::Transaction(id));
        assert_eq!(entry.amount, Decimal::new(-1250, 2));
    }

    #[test]
    fn rejects_mismatched_reference() {
        let id = Uuid::new_v4();
        assert!(model("Trade", Some(id), None).entryable().is_err());
        assert!(model("Transaction", Some(id), Some(id)).entryable().is_err());
        assert!(model("Transaction", None, None).entryable().is_err());
        assert!(model("Bogus", Some(id), None).entryable().is_err());
    }

    #[test]
    fn active_model_sets_only_the_variant_column() {
        let trade_id = Uuid::new_v4();
        let entry = Entry {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            amount: Decimal::new(-150_500, 2),
            currency: Currency::Usd,
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            name: "buy AAPL".to_string(),
            entryable: Entryable::Trade(trade_id),
            external_id: None,
            created_at: Utc::now(),
        };
        let am = active_model(&entry, Money::new(-150_500, Currency::Usd));
        assert_eq!(am.trade_id, ActiveValue::Set(Some(trade_id.to_string())));
        assert_eq!(am.transaction_id, ActiveValue::Set(None));
        assert_eq!(am.valuation_id, ActiveValue::Set(None));
        assert_eq!(am.entryable_type, ActiveValue::Set("Trade".to_string()));
    }
}
