//! # parlor-gateway
//!
//! HTTP/SSE implementation of the engine's transport contracts against a
//! deterministic AI gateway:
//!
//! - `GET /capabilities` — admission probe
//! - `GET /snapshot?offset=&limit=` — bounded historical batch
//! - `GET /tail[?since=]` — live server-sent-event stream of trail records
//! - `POST /ingress/intent` — outbound intent envelopes
//!
//! [`GatewayClient`] implements `EventSource`, `IntentSink`, and
//! `CapabilitiesProbe`; [`GatewayClient::into_backend`] packages all three
//! for `ChatSession::connect`.

#![deny(unsafe_code)]

pub mod client;
pub mod config;
mod sse;

pub use client::GatewayClient;
pub use config::GatewayConfig;
