//! Infra inventory kernel.
//!
//! Polls the Consul catalog for services tagged `ssl-proxy-backend`, keeps
//! the resulting website list as an in-memory snapshot mirrored to disk, and
//! serves it as a filterable dashboard behind a session gate.
//!
//! Pipeline: [`scheduler`] → [`sync`] → [`catalog`] → [`state`], then
//! [`facets`] and [`filter`] answer the [`http`] queries.

pub mod auth;
pub mod catalog;
pub mod config;
pub mod facets;
pub mod filter;
pub mod health;
pub mod http;
pub mod models;
pub mod render;
pub mod scheduler;
pub mod state;
pub mod sync;
