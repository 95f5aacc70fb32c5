//! Location value types.
//!
//! Locations come from two sources: a static template table (identified by
//! well-known slugs such as `"tutorial-grove"`) and player-created
//! locations generated mid-game by the location generator agent. Both share
//! this shape; `fateloom-world` tracks which set a given id belongs to.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ids::LocationId;

/// A place the player can be.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Content identifier (`"tutorial-grove"`).
    pub id: LocationId,
    /// Display name.
    pub name: String,
    /// Narrative description used in prompts and on arrival.
    pub description: String,
    /// Free-form tags consumed by the insight classifier and generators
    /// (`"forest"`, `"dungeon"`, `"urban"`).
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Ids of directly reachable locations.
    #[serde(default)]
    pub connections: BTreeSet<LocationId>,
    /// Rough threat level used to scale generated encounters.
    #[serde(default)]
    pub danger_level: u32,
}

impl Location {
    /// Whether this location is directly connected to another.
    pub fn connects_to(&self, other: &LocationId) -> bool {
        self.connections.contains(other)
    }

    /// Whether the location carries a tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connections_are_queryable() {
        let mut grove = Location {
            id: LocationId::from("tutorial-grove"),
            name: String::from("Tutorial Grove"),
            description: String::from("A quiet forest clearing."),
            tags: BTreeSet::new(),
            connections: BTreeSet::new(),
            danger_level: 1,
        };
        grove.connections.insert(LocationId::from("old-road"));
        assert!(grove.connects_to(&LocationId::from("old-road")));
        assert!(!grove.connects_to(&LocationId::from("abyss")));
    }

    #[test]
    fn tags_are_queryable() {
        let mut grove = Location {
            id: LocationId::from("tutorial-grove"),
            name: String::new(),
            description: String::new(),
            tags: BTreeSet::new(),
            connections: BTreeSet::new(),
            danger_level: 0,
        };
        grove.tags.insert(String::from("forest"));
        assert!(grove.has_tag("forest"));
        assert!(!grove.has_tag("dungeon"));
    }
}
