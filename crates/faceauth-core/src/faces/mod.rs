pub mod embedding;
pub mod enrollment;
pub mod extractor;
pub mod repository;
pub mod similarity;
pub mod store;

pub use embedding::{Embedding, EMBEDDING_ENCODING};

pub use enrollment::{enroll, EnrollmentOutcome, EnrollmentPolicy};

pub use extractor::{
    BoundingBox, DlibEmbedder, Embedder, EmbedderConfig, EnvModelPathResolver, FaceDetection,
    FaceModelPaths, ModelPathResolver,
};

pub use repository::{BestMatch, EmbeddingRepository, RepositoryWriter, Snapshot};

pub use similarity::{cosine_similarity, similarity, SimilarityError, ACCEPTANCE_THRESHOLD};

pub use store::{
    EnvStorePathResolver, FilesystemEmbeddingStore, IdentityRecord, MemoryStore, PersistentStore,
    StorePathResolver,
};
