//! Output generation: per-state CSV streams, consolidation, and the JSON
//! run summary.

pub mod csv;
pub mod summary;
