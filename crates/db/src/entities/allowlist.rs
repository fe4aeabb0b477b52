//! Allow-list entity.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A user permitted to run privileged operations. At most one row has
/// `is_owner` set.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "allowlist")]
pub struct Model {
    /// User ID.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Whether this user owns the bot.
    pub is_owner: bool,

    /// Created at timestamp.
    pub created_at: DateTime<Utc>,
}

/// Allow-list relations.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
