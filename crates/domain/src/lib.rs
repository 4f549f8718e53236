//! # cubelink-domain
//!
//! Pure protocol model for a toio-style robotic cube.
//!
//! ## Responsibilities
//! - Foundational types: cube identity, error taxonomy, parameter validation
//! - Define the **sub-channels** of the cube service and their fixed UUIDs
//! - Define **protocol versions** and the versioned layout table
//! - Encode typed parameters into **commands** (one codec per domain)
//! - Decode notification frames into typed **events** (one decoder per domain)
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or IO crates.
//! The transport boundary is expressed as traits in the `app` crate (ports).

pub mod channel;
pub mod command;
pub mod error;
pub mod event;
pub mod id;
pub mod protocol;
pub mod range;
pub mod version;
