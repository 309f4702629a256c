//! # apr-gateway
//!
//! REST API and WebSocket gateway that aggregates APR/APY yield rates from
//! centralized exchanges and DeFi protocols.
//!
//! Each configured source is polled concurrently and its rows normalized
//! into [`domain::Opportunity`] values. A recurring sync cycle stores a
//! snapshot of every opportunity, appends a down-sampled hourly APR
//! history per platform/asset series, and evaluates user threshold alerts,
//! producing notifications delivered over REST and WebSocket.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── SyncScheduler / SyncService (service/)
//!     ├── HistoryService, AlertService, NotificationService (service/)
//!     ├── EventBus (domain/)
//!     │
//!     ├── AggregationRegistry + YieldSource adapters (sources/)
//!     │
//!     └── YieldStore: PostgreSQL or in-memory (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
pub mod sources;
pub mod ws;
