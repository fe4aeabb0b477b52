//! Registered emote entity.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// An emote registered by a user and hosted in one of the storage containers.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "emotes")]
pub struct Model {
    /// Emote ID assigned by the hosting container. Never reused.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// User who registered the emote.
    pub adder_id: String,

    /// Storage container currently holding the asset.
    pub container_id: String,

    /// ID of the asset the emote was copied from (equal to `id` when the
    /// asset was already hosted in the pool).
    pub source_id: String,

    /// Display name. Not unique across adders.
    pub name: String,

    /// Whether the asset is animated. Selects the capacity class.
    pub is_animated: bool,

    /// Content URL.
    pub url: String,

    /// Local path derived from `(id, is_animated)`.
    pub relative_path: String,

    /// Created at timestamp.
    pub created_at: DateTime<Utc>,
}

impl Model {
    /// Derive the local asset path for an emote.
    #[must_use]
    pub fn relative_path_for(id: &str, is_animated: bool) -> String {
        let ext = if is_animated { "gif" } else { "png" };
        format!("emotes/{id}.{ext}")
    }
}

/// Emote relations.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::emote_alias::Entity")]
    Aliases,
}

impl Related<super::emote_alias::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Aliases.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_path_follows_animation() {
        assert_eq!(Model::relative_path_for("9", false), "emotes/9.png");
        assert_eq!(Model::relative_path_for("9", true), "emotes/9.gif");
    }
}
