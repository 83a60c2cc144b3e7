//! statrag-engine
//!
//! The document store, the rebuild orchestrator and the `RagService` façade
//! tying the keyword index, the vector index and the providers together.

pub mod prompt;
pub mod rebuild;
pub mod service;
pub mod store;

pub use rebuild::{build_generation, ProgressThrottle};
pub use service::{InitOptions, RagService, RagServiceBuilder, RagStream, SearchResponse, ServiceState, ServiceStats};
pub use store::{DocumentFilter, DocumentPage, DocumentStore, LibraryCount, Page};
