//! PM2.5 resolution service.
//!
//! Answers "what is the current PM2.5 near this point, and where did the
//! number come from?" by aggregating nearby OpenAQ stations and falling back
//! to the nearest WAQI station when the primary provider has nothing fresh.

pub mod alert;
pub mod config;
pub mod engine;
pub mod ingest;
pub mod locator;
pub mod logging;
pub mod memo;
pub mod model;
pub mod readings;
pub mod verify;
