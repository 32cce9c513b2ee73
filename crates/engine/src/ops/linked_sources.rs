use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue, Condition, QueryFilter, QueryOrder, TransactionTrait,
    prelude::*,
};
use uuid::Uuid;

use crate::{
    EngineError, LinkedSource, NewLinkedSourceCmd, Principal, ResultEngine, SourceStatus,
    linked_sources,
    util::normalize_optional_text,
};

use super::{Engine, with_tx};

impl Engine {
    /// Store (or replace) the credential of an external item.
    ///
    /// Re-linking an item keeps its sync cursor and makes it active again.
    /// An item already linked to another family is reported as a conflict.
    pub async fn save_linked_source(
        &self,
        principal: &Principal,
        cmd: NewLinkedSourceCmd,
    ) -> ResultEngine<LinkedSource> {
        let item_id = cmd.item_id.trim().to_string();
        if item_id.is_empty() {
            return Err(EngineError::Validation(
                "item id must not be empty".to_string(),
            ));
        }
        if cmd.access_token.trim().is_empty() {
            return Err(EngineError::Validation(
                "access token must not be empty".to_string(),
            ));
        }
        let sealed = self.cipher()?.encrypt(cmd.access_token.trim())?;
        let institution_id = normalize_optional_text(cmd.institution_id.as_deref());
        let institution_name = normalize_optional_text(cmd.institution_name.as_deref());
        let now = Utc::now();

        let model = with_tx!(self, |db_tx| {
            let existing = linked_sources::Entity::find()
                .filter(linked_sources::Column::ItemId.eq(item_id.clone()))
                .one(&db_tx)
                .await?;
            let model = match existing {
                Some(existing) if existing.family_id != principal.family_id.to_string() => {
                    return Err(EngineError::Conflict(format!("linked source {item_id}")));
                }
                Some(existing) => {
                    let mut active: linked_sources::ActiveModel = existing.into();
                    active.access_token = ActiveValue::Set(sealed);
                    active.institution_id = ActiveValue::Set(institution_id);
                    active.institution_name = ActiveValue::Set(institution_name);
                    active.status = ActiveValue::Set(SourceStatus::Active.as_str().to_string());
                    active.updated_at = ActiveValue::Set(now);
                    active.update(&db_tx).await?
                }
                None => {
                    linked_sources::ActiveModel {
                        id: ActiveValue::Set(Uuid::new_v4().to_string()),
                        family_id: ActiveValue::Set(principal.family_id.to_string()),
                        item_id: ActiveValue::Set(item_id.clone()),
                        access_token: ActiveValue::Set(sealed),
                        institution_id: ActiveValue::Set(institution_id),
                        institution_name: ActiveValue::Set(institution_name),
                        sync_cursor: ActiveValue::Set(None),
                        status: ActiveValue::Set(SourceStatus::Active.as_str().to_string()),
                        created_at: ActiveValue::Set(now),
                        updated_at: ActiveValue::Set(now),
                    }
                    .insert(&db_tx)
                    .await?
                }
            };
            Ok::<_, EngineError>(model)
        })?;
        tracing::info!(item_id = %model.item_id, family_id = %model.family_id, "linked source saved");
        LinkedSource::try_from(model)
    }

    /// Linked sources of the principal's family.
    pub async fn linked_sources(&self, principal: &Principal) -> ResultEngine<Vec<LinkedSource>> {
        linked_sources::Entity::find()
            .filter(linked_sources::Column::FamilyId.eq(principal.family_id.to_string()))
            .order_by_asc(linked_sources::Column::CreatedAt)
            .all(&self.database)
            .await?
            .into_iter()
            .map(LinkedSource::try_from)
            .collect()
    }

    pub async fn linked_source_by_item(
        &self,
        principal: &Principal,
        item_id: &str,
    ) -> ResultEngine<LinkedSource> {
        let model = self
            .require_linked_source(&self.database, principal, item_id)
            .await?;
        LinkedSource::try_from(model)
    }

    /// Plaintext access token of a linked source.
    pub(crate) fn open_access_token(&self, source: &LinkedSource) -> ResultEngine<String> {
        self.cipher()?
            .decrypt(&source.access_token)
            .map_err(Into::into)
    }

    /// Move the cursor from `expected` to `next`.
    ///
    /// The write only applies while the stored cursor still equals
    /// `expected`; otherwise another writer got there first and a
    /// `Conflict` is returned.
    pub async fn advance_cursor(
        &self,
        principal: &Principal,
        item_id: &str,
        expected: Option<&str>,
        next: &str,
    ) -> ResultEngine<()> {
        let mut update = linked_sources::Entity::update_many()
            .col_expr(linked_sources::Column::SyncCursor, Expr::value(next.to_string()))
            .col_expr(linked_sources::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(linked_sources::Column::ItemId.eq(item_id))
            .filter(linked_sources::Column::FamilyId.eq(principal.family_id.to_string()));
        update = match expected.filter(|c| !c.is_empty()) {
            Some(cursor) => update.filter(linked_sources::Column::SyncCursor.eq(cursor)),
            None => update.filter(
                Condition::any()
                    .add(linked_sources::Column::SyncCursor.is_null())
                    .add(linked_sources::Column::SyncCursor.eq("")),
            ),
        };
        let result = update.exec(&self.database).await?;
        if result.rows_affected != 1 {
            self.require_linked_source(&self.database, principal, item_id)
                .await?;
            return Err(EngineError::Conflict(format!(
                "cursor of linked source {item_id} moved"
            )));
        }
        tracing::debug!(%item_id, cursor = %next, "sync cursor advanced");
        Ok(())
    }

    /// Flag a source whose credential can no longer be used.
    pub async fn mark_requires_relink(&self, principal: &Principal, item_id: &str) -> ResultEngine<()> {
        linked_sources::Entity::update_many()
            .col_expr(
                linked_sources::Column::Status,
                Expr::value(SourceStatus::RequiresRelink.as_str()),
            )
            .col_expr(linked_sources::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(linked_sources::Column::ItemId.eq(item_id))
            .filter(linked_sources::Column::FamilyId.eq(principal.family_id.to_string()))
            .exec(&self.database)
            .await?;
        tracing::warn!(%item_id, "linked source requires relink");
        Ok(())
    }
}
