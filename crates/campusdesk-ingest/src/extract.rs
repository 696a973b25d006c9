//! Heuristic structure extraction from cleaned page text.
//!
//! Building directories, organizational-unit names and chunk type labels
//! are all recovered with fixed tables and regex rules; nothing here is a
//! general entity recognizer.

pub mod filters;
pub mod locations;
pub mod units;

pub use filters::{classify_chunk_type, contains_any, PHONE_KEYWORDS, SERVICE_KEYWORDS};
pub use locations::{detect_building, extract_offices, has_floor_structure, OfficeRecord};
pub use units::{detect_unit_name, extract_unit_names, normalize, UnitKey};
