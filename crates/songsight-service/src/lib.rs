//! Service layer for songsight.
//!
//! Sits between the core track feature index and whatever front end drives
//! it: layered configuration, resolution of external track ids into feature
//! vectors (catalog lookup, Spotify Web API, caching), and a [`Service`]
//! facade exposing the query operations with configured defaults.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod resilience;
pub mod resolve;
pub mod service;

pub use config::{Config, QueryDefaults};
pub use error::{ResolveError, ResolveResult};
pub use resolve::{CachingResolver, CatalogResolver, ChainResolver, SnapshotResolver, SpotifyResolver};
pub use service::{Match, Service};
