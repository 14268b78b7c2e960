use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("node not found: {name}")]
    NotFound { name: String },
    #[error("node already exists: {name}")]
    AlreadyExists { name: String },
    #[error("node '{node}' is already a child of '{parent}'")]
    AlreadyPositioned { node: String, parent: String },
    #[error("invalid node name: {0}")]
    InvalidName(String),
    #[error("invalid move: {0}")]
    InvalidMove(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("inconsistent state: {0}")]
    InconsistentState(String),
}

impl Error {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    pub fn already_exists(name: impl Into<String>) -> Self {
        Self::AlreadyExists { name: name.into() }
    }

    /// True for a name collision and for a move onto the current parent.
    ///
    /// Callers that map both conditions onto one conflict response can keep doing so.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. } | Self::AlreadyPositioned { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
