//! # places-server
//!
//! HTTP server library for places.
//!
//! This library provides the API handlers and state management that expose a
//! [`places_core::PlacesService`] over REST.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod api;
pub mod logging;
pub mod state;
