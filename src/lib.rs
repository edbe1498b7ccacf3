//! KICKAI — a Telegram assistant for amateur football team management.
//!
//! An inbound chat update flows: transport → [`router::AgenticMessageRouter`]
//! → [`orchestration::OrchestrationPipeline`] → selected agent → tools →
//! domain services → [`formatter::ResponseFormatter`] → transport.
//!
//! Each team is an independent tenant; persistent state lives in a document
//! store scoped by `team_id`. The registries ([`registry::Registries`]) are
//! built once at startup, validated by [`startup::StartupValidator`], and
//! frozen before the transport accepts traffic.
#![allow(missing_docs)] // TODO: enforce once core types are stable

pub mod config;
pub mod domain;
pub mod factories;
pub mod formatter;
pub mod logging;
pub mod orchestration;
pub mod providers;
pub mod registry;
pub mod router;
pub mod startup;
pub mod store;
pub mod telegram;
pub mod tools;
pub mod types;
