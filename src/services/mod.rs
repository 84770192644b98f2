pub mod embedding;
pub mod indexer;
pub mod onnx;
pub mod search;
pub mod vector_store;

pub use embedding::{Embedder, HttpEmbedder, create_embedder};
pub use indexer::{BatchIndexer, IndexProgress};
pub use onnx::OnnxEmbedder;
pub use search::Searcher;
pub use vector_store::{
    BatchTransaction, CollectionInfo, PgVectorStore, VectorStore, create_backend,
    create_shared_backend,
};
