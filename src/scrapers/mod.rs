//! Site traversal and extraction for CivicAtlas pages.
//!
//! The scraping pipeline has three layers:
//!
//! 1. **Classification** ([`links`]): recognize state, district, and
//!    urban-body links by their URL shapes
//! 2. **Extraction** ([`wards`]): map heterogeneous ward-table rows to
//!    [`crate::models::WardRecord`]s
//! 3. **Traversal** ([`site`]): orchestrate fetch → classify → recurse across
//!    the state → district → urban-body → ward hierarchy
//!
//! All parsing is pure over fetched documents; the traverser is generic over
//! `FetchPage`, so every layer is testable without a network.

pub mod links;
pub mod site;
pub mod wards;
