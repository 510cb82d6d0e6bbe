//! Map rendering state and tile management.
//!
//! This module provides the marker canvas driven by the sync client, map tile
//! fetching and caching, and Web Mercator projection utilities.

pub mod canvas;
pub mod tiles;

pub use canvas::MarkerCanvas;
pub use tiles::TileManager;
