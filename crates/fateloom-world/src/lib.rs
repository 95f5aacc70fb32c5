//! Location management: the static template table, discovery tracking,
//! and player-created locations.
//!
//! Locations come from two sources. **Templates** are a small built-in
//! table keyed by well-known slugs; games begin at
//! [`STARTING_LOCATION`] with only that template discovered.
//! **Custom locations** are generated mid-game by the location generator
//! agent and stored on the game state; registering one links it to the
//! location the player discovered it from.
//!
//! # Modules
//!
//! - [`templates`] -- The built-in template table
//! - [`registry`] -- Discovery and custom-location transitions over
//!   `GameState`

pub mod registry;
pub mod templates;

pub use registry::{DiscoveryOutcome, WorldError, discover_template, register_custom_location};
pub use templates::{STARTING_LOCATION, template_location};
