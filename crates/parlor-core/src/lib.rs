//! # parlor-core
//!
//! Foundation types and utilities for the Parlor chat client.
//!
//! This crate provides the shared vocabulary the other Parlor crates depend on:
//!
//! - **Branded IDs**: [`ids::ThreadId`], [`ids::TurnId`], [`ids::CorrelationId`] as newtypes
//! - **Reconnect policy**: [`retry::ReconnectPolicy`] for the tail restart loop
//! - **Text**: [`text::truncate_str`] UTF-8-safe truncation for derived titles
//! - **Logging**: [`logging::init_tracing`] subscriber setup
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by `parlor-engine` and `parlor-gateway`.

#![deny(unsafe_code)]

pub mod ids;
pub mod logging;
pub mod retry;
pub mod text;
