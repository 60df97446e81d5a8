//! realtimer - relays row-level database changes to live WebSocket subscribers
//!
//! - `reconcile`: keeps one callout trigger per watched (table, operation)
//! - `realtime`: ingestion, topic broker and WebSocket gateway
//! - `http_server`: axum surface over the relay

pub mod auth;
pub mod cli;
pub mod config;
pub mod http_server;
pub mod observability;
pub mod realtime;
pub mod reconcile;
