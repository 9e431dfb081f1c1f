pub mod schema;
pub mod source;
pub mod store;

pub use source::{
    SchemaVersion,
    SourceLibrary,
    read_ref_spectrum,
};
pub use store::LibraryStore;
