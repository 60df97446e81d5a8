//! # Real-Time Relay
//!
//! Moves row changes posted by database triggers to live WebSocket
//! subscribers.
//!
//! ## Architecture
//!
//! - **Codec**: trigger body -> column map -> JSON message
//! - **Ingest**: webhook callout -> topic -> broker publish
//! - **Broker**: topic -> subscriber fan-out (best-effort, at-most-once)
//! - **Gateway**: one authenticated connection per subscriber, one topic each
//!
//! A topic is `<operation>:<table>` with the operation lowercased, computed
//! the same way on the ingestion side and the subscribe side.

pub mod broker;
pub mod codec;
pub mod errors;
pub mod event;
pub mod gateway;
pub mod ingest;
pub mod topic;

pub use broker::{Broker, PublishReport, Subscriber, SubscriberSink};
pub use codec::{decode_columns, encode_columns, DecodedColumns};
pub use errors::{RealtimeError, RealtimeResult};
pub use event::{ChangeEvent, Columns, Operation};
pub use gateway::{ConnectionState, GatewaySession};
pub use ingest::Ingestor;
pub use topic::Topic;
