use uuid::Uuid;

/// Who is acting on behalf of a family.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Actor {
    User(Uuid),
    /// Reconciliation of the linked source with this item id.
    Sync(String),
}

/// Identity every engine operation is scoped to.
///
/// Resources outside `family_id` are reported as not found.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Principal {
    pub family_id: Uuid,
    pub actor: Actor,
}

impl Principal {
    #[must_use]
    pub fn user(family_id: Uuid, user_id: Uuid) -> Self {
        Self {
            family_id,
            actor: Actor::User(user_id),
        }
    }

    #[must_use]
    pub fn sync(family_id: Uuid, item_id: impl Into<String>) -> Self {
        Self {
            family_id,
            actor: Actor::Sync(item_id.into()),
        }
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.actor {
            Actor::User(id) => write!(f, "user:{id}@{}", self.family_id),
            Actor::Sync(item) => write!(f, "sync:{item}@{}", self.family_id),
        }
    }
}
