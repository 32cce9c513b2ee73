//! Investment trades.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Currency, EngineError, Money, ResultEngine, util::parse_uuid};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeKind {
    #[default]
    Buy,
    Sell,
}

impl TradeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl TryFrom<&str> for TradeKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            other => Err(EngineError::Validation(format!(
                "invalid trade kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub id: Uuid,
    pub security_id: Uuid,
    pub qty: Decimal,
    pub price: Decimal,
    pub kind: TradeKind,
    pub created_at: DateTime<Utc>,
}

impl Trade {
    /// Cash effect of the trade on the holding account.
    ///
    /// A buy spends `qty * price`, a sell receives it. The product is rounded
    /// half away from zero to the currency's minor units.
    ///
    /// ```rust
    /// use engine::{Currency, Trade, TradeKind};
    /// use rust_decimal::Decimal;
    ///
    /// let buy = Trade::new(uuid::Uuid::new_v4(), Decimal::new(10, 0), Decimal::new(15050, 2), TradeKind::Buy).unwrap();
    /// assert_eq!(buy.signed_amount(Currency::Usd).unwrap().to_decimal(), Decimal::new(-150500, 2));
    /// ```
    pub fn signed_amount(&self, currency: Currency) -> ResultEngine<Money> {
        let gross = self
            .qty
            .checked_mul(self.price)
            .ok_or_else(|| EngineError::Validation("trade value too large".to_string()))?;
        let amount = Money::rounded(gross, currency)?;
        Ok(match self.kind {
            TradeKind::Buy => -amount,
            TradeKind::Sell => amount,
        })
    }

    pub fn new(security_id: Uuid, qty: Decimal, price: Decimal, kind: TradeKind) -> ResultEngine<Self> {
        if qty <= Decimal::ZERO {
            return Err(EngineError::Validation("qty must be > 0".to_string()));
        }
        if price < Decimal::ZERO {
            return Err(EngineError::Validation("price must be >= 0".to_string()));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            security_id,
            qty,
            price,
            kind,
            created_at: Utc::now(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "trades")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub security_id: String,
    /// Decimal text, kept exact.
    pub qty: String,
    pub price: String,
    pub kind: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::entries::Entity")]
    Entries,
    #[sea_orm(
        belongs_to = "super::securities::Entity",
        from = "Column::SecurityId",
        to = "super::securities::Column::Id"
    )]
    Security,
}

impl Related<super::entries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Entries.def()
    }
}

impl Related<super::securities::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Security.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Trade> for ActiveModel {
    fn from(trade: &Trade) -> Self {
        Self {
            id: ActiveValue::Set(trade.id.to_string()),
            security_id: ActiveValue::Set(trade.security_id.to_string()),
            qty: ActiveValue::Set(trade.qty.to_string()),
            price: ActiveValue::Set(trade.price.to_string()),
            kind: ActiveValue::Set(trade.kind.as_str().to_string()),
            created_at: ActiveValue::Set(trade.created_at),
        }
    }
}

pub(crate) fn parse_decimal(value: &str, label: &str) -> ResultEngine<Decimal> {
    value
        .parse::<Decimal>()
        .map_err(|_| EngineError::Validation(format!("invalid {label}: {value}")))
}

impl TryFrom<Model> for Trade {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "trade")?,
            security_id: parse_uuid(&model.security_id, "security")?,
            qty: parse_decimal(&model.qty, "qty")?,
            price: parse_decimal(&model.price, "price")?,
            kind: TradeKind::try_from(model.kind.as_str())?,
            created_at: model.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn trade(kind: TradeKind, qty: Decimal, price: Decimal) -> Trade {
        Trade::new(Uuid::new_v4(), qty, price, kind).unwrap()
    }

    #[test]
    fn buy_is_negative_sell_is_positive() {
        let buy = trade(TradeKind::Buy, dec!(10), dec!(150.50));
        let sell = trade(TradeKind::Sell, dec!(10), dec!(150.50));
        assert_eq!(buy.signed_amount(Currency::Usd).unwrap().to_decimal(), dec!(-1505.00));
        assert_eq!(sell.signed_amount(Currency::Usd).unwrap().to_decimal(), dec!(1505.00));
    }

    #[test]
    fn fractional_shares_round_half_away_from_zero() {
        let buy = trade(TradeKind::Buy, dec!(0.5), dec!(0.01));
        assert_eq!(buy.signed_amount(Currency::Usd).unwrap().minor(), -1);
    }

    #[test]
    fn rejects_non_positive_qty_and_negative_price() {
        assert!(Trade::new(Uuid::new_v4(), dec!(0), dec!(1), TradeKind::Buy).is_err());
        assert!(Trade::new(Uuid::new_v4(), dec!(1), dec!(-1), TradeKind::Buy).is_err());
        assert!(Trade::new(Uuid::new_v4(), dec!(1), dec!(0), TradeKind::Sell).is_ok());
    }
}
