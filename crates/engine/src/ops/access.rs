use sea_orm::{ConnectionTrait, QueryFilter, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, Principal, ResultEngine, accounts, categories, linked_sources, merchants,
};

use super::Engine;

/// Generates an `_exists_for_family` check for an entity carrying a
/// `family_id` column.
///
/// Rows of another family are indistinguishable from missing rows.
macro_rules! impl_exists_for_family {
    ($exists_fn:ident, $entity:ident) => {
        pub(super) async fn $exists_fn<C: ConnectionTrait>(
            &self,
            db: &C,
            principal: &Principal,
            id: Uuid,
        ) -> ResultEngine<bool> {
            $entity::Entity::find_by_id(id.to_string())
                .filter($entity::Column::FamilyId.eq(principal.family_id.to_string()))
                .one(db)
                .await
                .map(|model| model.is_some())
                .map_err(Into::into)
        }
    };
}

impl Engine {
    impl_exists_for_family!(category_exists_for_family, categories);

    impl_exists_for_family!(merchant_exists_for_family, merchants);

    pub(super) async fn require_account<C: ConnectionTrait>(
        &self,
        db: &C,
        principal: &Principal,
        account_id: Uuid,
    ) -> ResultEngine<accounts::Model> {
        accounts::Entity::find_by_id(account_id.to_string())
            .filter(accounts::Column::FamilyId.eq(principal.family_id.to_string()))
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("account {account_id}")))
    }

    /// Linked source by item id, scoped to the principal's family.
    pub(super) async fn require_linked_source<C: ConnectionTrait>(
        &self,
        db: &C,
        principal: &Principal,
        item_id: &str,
    ) -> ResultEngine<linked_sources::Model> {
        linked_sources::Entity::find()
            .filter(linked_sources::Column::ItemId.eq(item_id))
            .filter(linked_sources::Column::FamilyId.eq(principal.family_id.to_string()))
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("linked source {item_id}")))
    }
}
