//! StudyHub Gate - request admission for the StudyHub forum API
//!
//! Every inbound request is keyed by client address and checked against a
//! per-client sliding-window quota before it reaches a handler. Requests over
//! quota are answered with 429. The admission table is sharded so unrelated
//! clients do not contend, and idle clients are swept in the background.

pub mod admission;
pub mod config;
pub mod error;
pub mod http;
