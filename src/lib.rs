//! Credit Applications API Library
//!
//! HTTP façade over a single wide table of credit-application records. The
//! core is the dynamic query builder that turns optional filters, partial
//! updates, and search terms into positionally parameterized SQL, plus the
//! per-request store connection lifecycle around it.
//!
//! # Modules
//!
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers (record operations).
//! - `models`: Row, request, and aggregate models.
//! - `query`: Pure statement/parameter construction.
//! - `store`: Per-request store connection lifecycle.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod query;
pub mod store;
