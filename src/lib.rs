//! CartGuard backend library
//!
//! Scam/fraud risk scoring for the CartGuard browser extension. The
//! extension snapshots the page the user is looking at and POSTs it here;
//! a set of agents (rule tables, web search, LLM) analyze it in parallel
//! and the server aggregates one bounded score, risk tier and flag list.

pub mod agents;
pub mod ai;
pub mod config;
pub mod extract;
pub mod schemas;
pub mod search;
pub mod server;
