//! Per-user routing and interview-history based project recommendations.
//!
//! Two services are built from this crate:
//! - the replica (`user-routing` binary), which serves `GET /recommendations`
//!   from MongoDB history, a Hugging Face embedding model and an Elasticsearch
//!   kNN index, memoizing results per user;
//! - the gateway (`gateway` binary), which hashes the `userId` header onto a
//!   fixed replica list and proxies the request there.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod middleware;
pub mod models;
pub mod services;
pub mod telemetry;
