//! Pulse News - headline, quote and poll backend for the mobile client
//!
//! Fetches categorized headlines and stock quotes from third-party APIs,
//! forwards poll votes to a remote document store, and keeps per-device
//! preferences (saved articles, voted polls) in a local key-value store.

pub mod config;
pub mod db;
pub mod error;
pub mod news;
pub mod polls;
pub mod routes;
pub mod stocks;
pub mod store;
