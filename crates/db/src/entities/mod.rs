//! Database entities.
//!
//! One canonical schema: emotes and their per-user aliases, plus the
//! allow-list and deny-list that gate privileged operations.

pub mod allowlist;
pub mod denylist;
pub mod emote;
pub mod emote_alias;

pub use allowlist::Entity as AllowList;
pub use denylist::Entity as DenyList;
pub use emote::Entity as Emote;
pub use emote_alias::Entity as EmoteAlias;
