//! Document storage backends.
//!
//! - `PgVectorStore`: the `(content, embedding)` table, ranked by pgvector's `<=>` operator
//! - `InMemoryDocumentStore`: brute-force cosine ranking, for tests and offline demos
//! - `CollectionStore`: collection-scoped tables used by the direct vector-store search

mod collection;
mod document;
mod memory;
mod postgres;

pub use collection::{CollectionStore, ScoredDocument};
pub use document::{DocumentHit, DocumentStore};
pub use memory::InMemoryDocumentStore;
pub use postgres::PgVectorStore;
