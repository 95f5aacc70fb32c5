//! Strongly typed identifiers for every entity in the engine.
//!
//! Two id families exist. **Row ids** (games, planning sessions) wrap a
//! UUID v7 so database indexes stay time-ordered. **Content ids**
//! (locations, skills, quests, beats, ...) wrap slug strings: they
//! originate in static content tables or in LLM-generated JSON
//! (`"tutorial-grove"`, `"power_strike"`), and keeping them
//! human-readable keeps the event log searchable.
//!
//! Both families are newtypes, so handing a `SkillId` where a `QuestId`
//! belongs is a compile error, not a save-corrupting bug. Each family is
//! declared in one batch below; the macros exist only to keep the
//! declarations to a single line per id.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a batch of UUID-backed row id newtypes.
macro_rules! uuid_id_family {
    ($($(#[$doc:meta])* $name:ident;)+) => {$(
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub Uuid);

        impl $name {
            /// Mint a fresh, time-ordered identifier.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// The wrapped [`Uuid`].
            pub const fn as_uuid(self) -> Uuid {
                self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(raw: Uuid) -> Self {
                Self(raw)
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }
    )+};
}

/// Declares a batch of slug-string content id newtypes.
macro_rules! slug_id_family {
    ($($(#[$doc:meta])* $name:ident;)+) => {$(
        $(#[$doc])*
        #[derive(
            Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Wrap a slug string in the typed identifier.
            pub fn new(slug: impl Into<String>) -> Self {
                Self(slug.into())
            }

            /// The slug as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Unwrap into the inner [`String`].
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl From<&str> for $name {
            fn from(slug: &str) -> Self {
                Self(slug.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(slug: String) -> Self {
                Self(slug)
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }
    )+};
}

uuid_id_family! {
    /// Unique identifier for a game save.
    GameId;
    /// Unique identifier for a persisted planning session.
    PlanningSessionId;
}

slug_id_family! {
    /// Identifier for a location, template or player-created
    /// (`"tutorial-grove"`).
    LocationId;
    /// Identifier for an NPC.
    NpcId;
    /// Identifier for a quest.
    QuestId;
    /// Identifier for a skill (`"power_strike"`).
    SkillId;
    /// Identifier for an inventory or shop item.
    ItemId;
    /// Identifier for a narrative beat inside a plot node.
    BeatId;
    /// Identifier for a plot thread grouping related beats.
    ThreadId;
    /// Identifier for a plot graph node.
    NodeId;
    /// Identifier for a plot graph edge.
    EdgeId;
    /// Identifier for a skill fusion recipe.
    RecipeId;
}
