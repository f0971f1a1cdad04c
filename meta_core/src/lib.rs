// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # meta-core
//!
//! Streaming media-file ingestion pipeline, container lifecycle manager, task
//! scheduler, and callback router for a media-file enrichment service.
//!
//! Follows Clean Architecture / DDD layering:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Application Layer                          │
//! │  (Pipeline, TaskScheduler, GateController, StateRegistry,    │
//! │   PersistenceAdapter, EventConsumer, CallbackRouter)         │
//! └─────────────────────────────────────────────────────────────┘
//!                                │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Domain Layer (meta-core-domain)           │
//! │  (Entities, value objects, port traits, domain errors)       │
//! └─────────────────────────────────────────────────────────────┘
//!                                │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                Infrastructure Layer                          │
//! │  (bollard, reqwest, axum, sqlx, notify adapters; config,     │
//! │   logging, metrics)                                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod application;
pub mod infrastructure;

pub use meta_core_domain::{CoreError, CoreResult};
