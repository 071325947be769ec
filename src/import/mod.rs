//! The streaming export-archive importer: reads a Skype JSON export
//! (optionally tar-wrapped) and populates a fresh database, per spec.md
//! §4.5. Grounded on the teacher's `quick_xml::Reader` pull-parser idiom,
//! hand-rolled here for JSON since no ecosystem SAX-style JSON crate
//! appears in the retrieval pack.

pub mod archive;
pub mod importer;
pub mod jsonevents;

pub use archive::open_export_reader;
pub use importer::{import_export_archive, ImportSummary};
pub use jsonevents::{JsonEvent, JsonEventReader};
