//! Valuation details: the record behind synthetic "Initial Balance" entries.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, util::parse_uuid};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuationKind {
    #[default]
    Opening,
}

impl ValuationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Opening => "opening",
        }
    }
}

impl TryFrom<&str> for ValuationKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "opening" => Ok(Self::Opening),
            other => Err(EngineError::Validation(format!(
                "invalid valuation kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Valuation {
    pub id: Uuid,
    pub kind: ValuationKind,
    pub created_at: DateTime<Utc>,
}

impl Valuation {
    pub fn opening() -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: ValuationKind::Opening,
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "valuations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub kind: String,
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

impl From<&Valuation> for ActiveModel {
    fn from(value: &Valuation) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            kind: ActiveValue::Set(value.kind.as_str().to_string()),
            created_at: ActiveValue::Set(value.created_at),
        }
    }
}

impl TryFrom<Model> for Valuation {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "valuation")?,
            kind: ValuationKind::try_from(model.kind.as_str())?,
            created_at: model.created_at,
        })
    }
}
