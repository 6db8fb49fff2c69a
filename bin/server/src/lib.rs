//! nodeflow server.
//!
//! HTTP ingress for manual runs and webhooks, the trigger queue worker, and
//! the Postgres-backed stores the run driver uses.

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod webhook;
pub mod worker;
