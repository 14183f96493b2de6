use thiserror::Error;

/// Store-layer errors. The engine maps these onto its own typed error
/// kinds; this layer only distinguishes what the stores themselves can
/// tell us.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("metadata store error: {0}")]
    Metadata(#[from] sqlx::Error),
    #[error("role name already taken for this owner")]
    NameTaken,
    #[error("graph store error: {0}")]
    Graph(String),
    #[error("graph store unavailable: {0}")]
    GraphUnavailable(String),
    #[error("not found")]
    NotFound,
}
