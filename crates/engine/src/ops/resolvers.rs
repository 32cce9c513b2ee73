//! Get-or-create of natural-keyed reference rows.
//!
//! Each resolver is an `INSERT … ON CONFLICT DO NOTHING` followed by a read
//! on the natural key, so concurrent callers converge on one row without a
//! lock. Existing rows are never rewritten.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveValue, DatabaseConnection, Insert, IntoActiveModel, QueryOrder, QuerySelect, prelude::*,
    sea_query::OnConflict,
};
use uuid::Uuid;

use crate::{
    EngineError, Principal, ResultEngine, Security, categories, merchants,
    securities::{self, normalize_ticker},
    util::{parse_uuid, required_name},
};

use super::Engine;

impl Engine {
    /// Merchant id for `name` within the principal's family.
    ///
    /// Names differing only by case, accents or punctuation resolve to the
    /// same merchant; the first spelling is kept for display.
    pub async fn get_or_create_merchant(
        &self,
        principal: &Principal,
        name: &str,
    ) -> ResultEngine<Uuid> {
        let (name, name_norm) = required_name(name, "merchant")?;
        let family_id = principal.family_id.to_string();
        let model = merchants::ActiveModel {
            id: ActiveValue::Set(Uuid::new_v4().to_string()),
            family_id: ActiveValue::Set(family_id.clone()),
            name: ActiveValue::Set(name),
            name_norm: ActiveValue::Set(name_norm.clone()),
            created_at: ActiveValue::Set(Utc::now()),
        };
        insert_ignoring_conflict(
            merchants::Entity::insert(model).on_conflict(
                OnConflict::columns([merchants::Column::FamilyId, merchants::Column::NameNorm])
                    .do_nothing()
                    .to_owned(),
            ),
            &self.database,
        )
        .await?;

        let row = merchants::Entity::find()
            .filter(merchants::Column::FamilyId.eq(family_id))
            .filter(merchants::Column::NameNorm.eq(name_norm.clone()))
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("merchant {name_norm}")))?;
        parse_uuid(&row.id, "merchant")
    }

    /// Category id for `name` within the principal's family.
    pub async fn get_or_create_category(
        &self,
        principal: &Principal,
        name: &str,
    ) -> ResultEngine<Uuid> {
        let (name, name_norm) = required_name(name, "category")?;
        let family_id = principal.family_id.to_string();
        let model = categories::ActiveModel {
            id: ActiveValue::Set(Uuid::new_v4().to_string()),
            family_id: ActiveValue::Set(family_id.clone()),
            name: ActiveValue::Set(name),
            name_norm: ActiveValue::Set(name_norm.clone()),
        };
        insert_ignoring_conflict(
            categories::Entity::insert(model).on_conflict(
                OnConflict::columns([categories::Column::FamilyId, categories::Column::NameNorm])
                    .do_nothing()
                    .to_owned(),
            ),
            &self.database,
        )
        .await?;

        let row = categories::Entity::find()
            .filter(categories::Column::FamilyId.eq(family_id))
            .filter(categories::Column::NameNorm.eq(name_norm.clone()))
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("category {name_norm}")))?;
        parse_uuid(&row.id, "category")
    }

    /// Security id for `ticker`; `name` is only used when the row is created.
    pub async fn get_or_create_security(
        &self,
        ticker: &str,
        name: Option<&str>,
    ) -> ResultEngine<Uuid> {
        let ticker = normalize_ticker(ticker)?;
        let name = name
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map_or_else(|| ticker.clone(), ToString::to_string);
        let model = securities::ActiveModel {
            id: ActiveValue::Set(Uuid::new_v4().to_string()),
            ticker: ActiveValue::Set(ticker.clone()),
            name: ActiveValue::Set(name),
            latest_price: ActiveValue::Set(None),
            last_updated: ActiveValue::Set(None),
        };
        insert_ignoring_conflict(
            securities::Entity::insert(model).on_conflict(
                OnConflict::column(securities::Column::Ticker)
                    .do_nothing()
                    .to_owned(),
            ),
            &self.database,
        )
        .await?;

        let row = securities::Entity::find()
            .filter(securities::Column::Ticker.eq(ticker.clone()))
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("security {ticker}")))?;
        parse_uuid(&row.id, "security")
    }

    pub async fn security_by_ticker(&self, ticker: &str) -> ResultEngine<Option<Security>> {
        let ticker = normalize_ticker(ticker)?;
        securities::Entity::find()
            .filter(securities::Column::Ticker.eq(ticker))
            .one(&self.database)
            .await?
            .map(Security::try_from)
            .transpose()
    }

    /// Record the latest known price of a security.
    pub async fn update_security_price(&self, ticker: &str, price: Decimal) -> ResultEngine<()> {
        let ticker = normalize_ticker(ticker)?;
        if price < Decimal::ZERO {
            return Err(EngineError::Validation("price must be >= 0".to_string()));
        }
        let result = securities::Entity::update_many()
            .col_expr(securities::Column::LatestPrice, Expr::value(price.to_string()))
            .col_expr(securities::Column::LastUpdated, Expr::value(Utc::now()))
            .filter(securities::Column::Ticker.eq(ticker.clone()))
            .exec(&self.database)
            .await?;
        if result.rows_affected == 0 {
            return Err(EngineError::NotFound(format!("security {ticker}")));
        }
        tracing::debug!(%ticker, %price, "security price updated");
        Ok(())
    }

    /// Every known ticker, in order.
    pub async fn active_tickers(&self) -> ResultEngine<Vec<String>> {
        securities::Entity::find()
            .select_only()
            .column(securities::Column::Ticker)
            .distinct()
            .order_by_asc(securities::Column::Ticker)
            .into_tuple()
            .all(&self.database)
            .await
            .map_err(Into::into)
    }
}

/// Run an insert whose conflict clause is `DO NOTHING`. A skipped row is not
/// an error.
async fn insert_ignoring_conflict<A>(insert: Insert<A>, db: &DatabaseConnection) -> ResultEngine<()>
where
    A: ActiveModelTrait,
    <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
{
    match insert.exec_without_returning(db).await {
        Ok(_) | Err(DbErr::RecordNotInserted) => Ok(()),
        Err(err) => Err(err.into()),
    }
}
