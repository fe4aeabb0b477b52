//! Emote alias entity (private per-user nicknames).

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "emote_aliases")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// The aliased emote. Not enforced by a foreign key; deleting an emote
    /// deletes its aliases explicitly.
    pub emote_id: String,

    /// The only user who resolves through this alias.
    pub owner_id: String,

    /// Alias text as entered. Compared case-insensitively.
    pub alias: String,

    pub created_at: DateTime<Utc>,
}

impl Model {
    /// Whether `text` matches this alias, ignoring case.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        self.alias.to_lowercase() == text.to_lowercase()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::emote::Entity",
        from = "Column::EmoteId",
        to = "super::emote::Column::Id"
    )]
    Emote,
}

impl Related<super::emote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Emote.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
