//! CampusDesk Ingest: text cleaning, office-location extraction, unit
//! identification and chunk building.

pub mod builder;
pub mod chunking;
pub mod clean;
pub mod extract;
pub mod source;

pub use builder::{location_chunk, ChunkBuilder, CleanedDocument, LocationIndex};
pub use chunking::RecursiveChunker;
pub use clean::{clean, strip_supplement, SUPPLEMENT_MARKER};
pub use extract::{
    classify_chunk_type, detect_building, detect_unit_name, extract_offices, extract_unit_names,
    normalize, OfficeRecord, UnitKey,
};
pub use source::{load_raw_documents, read_chunks, write_chunks, RawDocument};
