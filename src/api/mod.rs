//! Remote API adapter
//!
//! Implements the [`crate::ports::BranchApi`] and [`crate::ports::CertSource`]
//! ports over the managed database REST API.

mod client;

pub use client::HttpApiClient;
