//! # TaskTrail API Server Library
//!
//! HTTP surface over the TaskTrail storage layer: projects, tasks, the
//! recycle bin and the audit log.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: Request extractors (storage handle, client metadata, validated JSON)
//! - `middleware`: JWT authentication and the admin gate
//! - `response`: Response envelope
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod response;
pub mod routes;
