//! Repositories for database access.

pub mod access_list;
pub mod emote;
pub mod emote_alias;

pub use access_list::AccessListRepository;
pub use emote::EmoteRepository;
pub use emote_alias::EmoteAliasRepository;
