//! Date-bounded review harvesting from SaaS listing sites.
//!
//! Drives a real Chrome instance over CDP, walks a paginated review
//! listing, and keeps the reviews whose dates fall inside a requested
//! window. The DOM surface is behind a trait so the harvest loop can
//! run against fixtures in tests.

pub mod antibot;
pub mod browser;
pub mod cli;
pub mod config;
pub mod dates;
pub mod dom;
pub mod harvest;
pub mod models;
pub mod output;
pub mod sites;
