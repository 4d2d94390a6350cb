//! Canonical geography: the reference table and the standardizer that maps
//! free-text place names onto it.

pub mod reference;
pub mod standardize;

pub use reference::GeoReference;
pub use standardize::{unresolved_marker, GeoStandardizer, REGION_ERROR_MARKER};
