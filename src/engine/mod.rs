//! # Engine Module
//!
//! Internal ECS engine implementation.
//!
//! This module contains all core ECS building blocks such as:
//! - Component registration and column storage
//! - Archetypes and entity management
//! - The world, its deferral queue and query execution
//! - Systems and the per-frame schedule
//!
//! Public API exposure is controlled by `lib.rs`.

pub mod types;
pub mod config;
pub mod error;
pub mod component;
pub mod storage;
pub mod entity;
pub mod archetype;
pub mod query;
pub mod commands;
pub mod systems;
pub mod scheduler;
pub mod manager;
pub mod borrow;
