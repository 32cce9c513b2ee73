//! Tradable securities, shared across families and keyed by ticker.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, trades::parse_decimal, util::parse_uuid};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Security {
    pub id: Uuid,
    pub ticker: String,
    pub name: String,
    pub latest_price: Option<Decimal>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Canonical ticker form: trimmed and upper-cased.
pub(crate) fn normalize_ticker(value: &str) -> ResultEngine<String> {
    let ticker = value.trim().to_ascii_uppercase();
    if ticker.is_empty() {
        return Err(EngineError::Validation(
            "ticker must not be empty".to_string(),
        ));
    }
    Ok(ticker)
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "securities")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub ticker: String,
    pub name: String,
    pub latest_price: Option<String>,
    pub last_updated: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::trades::Entity")]
    Trades,
}

impl Related<super::trades::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Trades.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Security {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "security")?,
            ticker: model.ticker,
            name: model.name,
            latest_price: model
                .latest_price
                .as_deref()
                .map(|p| parse_decimal(p, "price"))
                .transpose()?,
            last_updated: model.last_updated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tickers_are_trimmed_and_uppercased() {
        assert_eq!(normalize_ticker(" aapl ").unwrap(), "AAPL");
        assert!(normalize_ticker("  ").is_err());
    }
}
