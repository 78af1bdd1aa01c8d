//! Arrival normalization and aggregation.
//!
//! Decoded stop-time updates flow through [`time::TimeResolver`] into
//! [`aggregate::ArrivalAggregator`], which groups them per station and
//! route; [`speech`] renders the grouped lists as short sentences.

pub mod aggregate;
pub mod speech;
pub mod time;
pub mod types;
