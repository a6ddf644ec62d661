//! Error taxonomy for the usage accounting engine

use thiserror::Error;

/// Errors raised by the persistence layer itself, independent of any
/// particular entity.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The requested row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An insert collided with an existing row and was treated as a no-op.
    #[error("conflict on {0}")]
    Conflict(String),

    /// A foreign-key reference in the row being written does not resolve.
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// An operational problem (connection, timeout, pool exhaustion) that a
    /// retry or message redelivery might resolve.
    #[error("transient store error: {0}")]
    Transient(#[from] sqlx::Error),
}

impl StoreError {
    /// True if this error represents a missing foreign key, the case
    /// `ensure_sku`-and-retry recovery is built for.
    pub fn is_missing_reference(&self) -> bool {
        matches!(self, StoreError::Integrity(_))
    }
}

/// Errors raised by the Catalogue (C2).
#[derive(Error, Debug)]
pub enum CatalogueError {
    /// `upsert_price` was called for a SKU with no existing BillingItem.
    #[error("unknown SKU: {sku}")]
    UnknownSku { sku: String },

    /// `upsert_price` was called with a `valid_from` earlier than the
    /// item's current price head.
    #[error("price out of order for {sku}: valid_from {valid_from} precedes current head {head}")]
    PriceOutOfOrder {
        sku: String,
        valid_from: String,
        head: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors raised while ingesting a message of any of the three known
/// schemas (C4, C5, WorkspaceMap).
#[derive(Error, Debug)]
pub enum IngestError {
    /// The message itself failed to validate (bad UUID, bad timestamp,
    /// missing required field). Never worth retrying.
    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Catalogue(#[from] CatalogueError),
}

/// How a failure should be handled by the component that surfaced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Drop the message/request; retrying would not help.
    Permanent,
    /// Ask for redelivery / let the caller retry.
    Transient,
}

impl IngestError {
    /// Classify this error for the bus dispatcher: validation errors are
    /// permanent, everything store-shaped is fail-safe toward transient.
    pub fn classify(&self) -> ErrorClass {
        match self {
            IngestError::Validation(_) => ErrorClass::Permanent,
            IngestError::Store(StoreError::Transient(_)) => ErrorClass::Transient,
            IngestError::Store(_) => ErrorClass::Transient,
            IngestError::Catalogue(_) => ErrorClass::Transient,
        }
    }
}

/// Errors raised by EventQuery (C7).
#[derive(Error, Debug)]
pub enum QueryError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors raised loading configuration or seeding the catalogue at startup.
/// All variants of this type are fatal: the owning process should log and
/// exit rather than attempt to continue in a half-configured state.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("malformed configuration: {0}")]
    Malformed(#[from] config::ConfigError),

    #[error("malformed catalogue seed file: {0}")]
    MalformedCatalogue(String),

    #[error("catalogue seed file is not a YAML mapping")]
    CatalogueNotAMapping,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Top-level error aggregating every error a binary might need to match on
/// at its process boundary (HTTP status code, or bus ack/nack).
#[derive(Error, Debug)]
pub enum AppError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("catalogue error: {0}")]
    Catalogue(#[from] CatalogueError),

    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("query error: {0}")]
    Query(#[from] QueryError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
pub type CatalogueResult<T> = Result<T, CatalogueError>;
pub type IngestResult<T> = Result<T, IngestError>;
pub type QueryResult<T> = Result<T, QueryError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type AppResult<T> = Result<T, AppError>;
