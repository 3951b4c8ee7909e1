//! Live e-jeep location tracker.
//!
//! GPS clients post fixes to the server, which keeps the latest fix per vehicle
//! in memory, relays it to viewers over Socket.IO and, when configured, logs it
//! to PostgreSQL and a Redis REST cache. Viewers fall back to polling when the
//! realtime channel drops.

pub mod cache;
pub mod database;
pub mod geo;
pub mod hub;
pub mod logging;
pub mod models;
pub mod opts;
pub mod persistence;
pub mod stops;
pub mod store;
pub mod sweeper;
pub mod viewer;
pub mod web;

pub type Result<T = ()> = anyhow::Result<T>;
