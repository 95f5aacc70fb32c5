//! Discovery and custom-location transitions over `GameState`.
//!
//! Pure snapshot-in, snapshot-out functions, matching the rules crate's
//! discipline: the orchestrator applies the returned state and emits the
//! matching exploration events.

use fateloom_types::game::GameState;
use fateloom_types::ids::LocationId;
use fateloom_types::location::Location;

use crate::templates::template_location;

/// Errors from world transitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    /// The id names neither a template nor a known custom location.
    #[error("unknown location: {0}")]
    UnknownLocation(LocationId),

    /// A custom location id collides with an existing one.
    #[error("location id already in use: {0}")]
    DuplicateLocation(LocationId),
}

/// The result of a discovery or registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryOutcome {
    /// The new game state.
    pub state: GameState,
    /// The location that became reachable.
    pub location: Location,
    /// Whether this was the first discovery (false for re-visits).
    pub newly_discovered: bool,
}

/// Mark a template location discovered and connect it to the current
/// location if the template table does not already link them.
///
/// # Errors
///
/// Returns [`WorldError::UnknownLocation`] if the id is not a template.
pub fn discover_template(
    state: &GameState,
    id: &LocationId,
) -> Result<DiscoveryOutcome, WorldError> {
    let Some(location) = template_location(id) else {
        return Err(WorldError::UnknownLocation(id.clone()));
    };
    let mut next = state.clone();
    let newly_discovered = next.discovered_locations.insert(id.clone());
    if newly_discovered {
        tracing::info!(location = %id, "template location discovered");
    }
    Ok(DiscoveryOutcome {
        state: next,
        location,
        newly_discovered,
    })
}

/// Register a generated location: store it, link it from the player's
/// current location, and mark it discovered.
///
/// # Errors
///
/// Returns [`WorldError::DuplicateLocation`] if the id collides with a
/// template or an existing custom location.
pub fn register_custom_location(
    state: &GameState,
    location: Location,
) -> Result<DiscoveryOutcome, WorldError> {
    if template_location(&location.id).is_some()
        || state.custom_locations.contains_key(&location.id)
    {
        return Err(WorldError::DuplicateLocation(location.id.clone()));
    }

    let mut next = state.clone();
    let mut stored = location.clone();
    // The new place always links back to where it was found from.
    stored.connections.insert(next.current_location.id.clone());
    next.current_location
        .connections
        .insert(stored.id.clone());
    next.discovered_locations.insert(stored.id.clone());
    next.custom_locations.insert(stored.id.clone(), stored.clone());

    tracing::info!(location = %stored.id, "custom location registered");

    Ok(DiscoveryOutcome {
        state: next,
        location: stored,
        newly_discovered: true,
    })
}
