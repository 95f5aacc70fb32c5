//! The built-in location template table.
//!
//! A deliberately small set: enough for every game to bootstrap and for
//! tests to exercise discovery. Campaign geography beyond these slugs is
//! player-created through the location generator agent.

use std::collections::BTreeSet;

use fateloom_types::ids::LocationId;
use fateloom_types::location::Location;

/// The slug every new game starts at.
pub const STARTING_LOCATION: &str = "tutorial-grove";

/// One template row.
struct TemplateRow {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    tags: &'static [&'static str],
    connections: &'static [&'static str],
    danger_level: u32,
}

const TEMPLATES: &[TemplateRow] = &[
    TemplateRow {
        id: "tutorial-grove",
        name: "Tutorial Grove",
        description: "A quiet forest clearing where the system first speaks.",
        tags: &["forest", "safe"],
        connections: &["old-road"],
        danger_level: 1,
    },
    TemplateRow {
        id: "old-road",
        name: "The Old Road",
        description: "A cracked trade road swallowed by weeds, running toward town.",
        tags: &["road"],
        connections: &["tutorial-grove", "emberfall-town", "rat-warrens"],
        danger_level: 2,
    },
    TemplateRow {
        id: "emberfall-town",
        name: "Emberfall Town",
        description: "A walled town of smiths and rumors, lit by forge-light.",
        tags: &["urban", "safe", "shops"],
        connections: &["old-road"],
        danger_level: 1,
    },
    TemplateRow {
        id: "rat-warrens",
        name: "The Rat Warrens",
        description: "Collapsed cellars under the road, chittering in the dark.",
        tags: &["dungeon", "dark"],
        connections: &["old-road"],
        danger_level: 3,
    },
];

/// Look up a template location by id.
pub fn template_location(id: &LocationId) -> Option<Location> {
    TEMPLATES
        .iter()
        .find(|row| row.id == id.as_str())
        .map(|row| Location {
            id: LocationId::from(row.id),
            name: String::from(row.name),
            description: String::from(row.description),
            tags: row.tags.iter().map(|t| String::from(*t)).collect(),
            connections: row
                .connections
                .iter()
                .map(|c| LocationId::from(*c))
                .collect(),
            danger_level: row.danger_level,
        })
}

/// All template ids, for prerequisite checks.
pub fn template_ids() -> BTreeSet<LocationId> {
    TEMPLATES.iter().map(|row| LocationId::from(row.id)).collect()
}
