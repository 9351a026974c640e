use std::fmt;
use thiserror::Error;

/// Store-layer error type.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Entity kind, used in not-found errors and store diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    User,
    Place,
    Amenity,
    Review,
}

impl EntityKind {
    /// Returns the lowercase kind name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Place => "place",
            Self::Amenity => "amenity",
            Self::Review => "review",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by this crate.
///
/// The variants form a closed taxonomy so callers (HTTP boundaries in
/// particular) can switch on kind instead of inspecting messages.
#[derive(Debug, Error)]
pub enum Error {
    /// Identifier does not resolve to an existing entity of the expected kind.
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },
    /// A uniqueness invariant would be violated.
    #[error("{0}")]
    Duplicate(String),
    /// A cardinality invariant would be violated.
    #[error("{0}")]
    Conflict(String),
    /// A field fails its per-entity constraint.
    #[error("{0}")]
    Validation(String),
    /// Caller lacks permission for the requested mutation.
    #[error("{0}")]
    Forbidden(String),
    /// Password hashing failure.
    #[error("password hash error: {0}")]
    Hash(#[source] StoreError),
    /// Store error wrapper.
    #[error("store error: {0}")]
    Store(#[source] StoreError),
}

impl Error {
    /// Builds a not-found error for an entity kind and id.
    pub fn not_found(kind: EntityKind, id: impl fmt::Display) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

impl From<StoreError> for Error {
    fn from(error: StoreError) -> Self {
        Self::Store(error)
    }
}
