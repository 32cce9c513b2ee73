//! Links between a family and an external bank-aggregation item.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, util::parse_uuid};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    #[default]
    Active,
    /// The stored credential is unusable; the user must link the item again.
    RequiresRelink,
}

impl SourceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::RequiresRelink => "requires_relink",
        }
    }
}

impl TryFrom<&str> for SourceStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "active" => Ok(Self::Active),
            "requires_relink" => Ok(Self::RequiresRelink),
            other => Err(EngineError::Validation(format!(
                "invalid source status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedSource {
    pub id: Uuid,
    pub family_id: Uuid,
    pub item_id: String,
    /// Encrypted access token, as stored.
    #[serde(skip_serializing)]
    pub access_token: String,
    pub institution_id: Option<String>,
    pub institution_name: Option<String>,
    /// `None` means "from the beginning".
    pub sync_cursor: Option<String>,
    pub status: SourceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "linked_sources")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub family_id: String,
    #[sea_orm(unique)]
    pub item_id: String,
    pub access_token: String,
    pub institution_id: Option<String>,
    pub institution_name: Option<String>,
    pub sync_cursor: Option<String>,
    pub status: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for LinkedSource {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "linked source")?,
            family_id: parse_uuid(&model.family_id, "family")?,
            item_id: model.item_id,
            access_token: model.access_token,
            institution_id: model.institution_id,
            institution_name: model.institution_name,
            sync_cursor: model.sync_cursor.filter(|c| !c.is_empty()),
            status: SourceStatus::try_from(model.status.as_str())?,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
