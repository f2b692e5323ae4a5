//! Cross-catalog availability resolution.
//!
//! Given a track (or album) identified on one catalog, find where else it
//! can be streamed. Structured like the other API integrations:
//! `client` (HTTP), `dto` (wire shapes), `adapter` (DTO to domain) and
//! `domain` (our types).

mod adapter;
mod client;
pub mod domain;
pub mod dto;
pub mod youtube;

pub use client::AvailabilityClient;
pub use domain::{
    AlbumAvailability, Platform, PlatformLink, QobuzMatch, ResolveError, TrackAvailability,
    TrackSource,
};
