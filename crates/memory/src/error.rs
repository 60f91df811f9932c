use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("max_entries must be positive")]
    InvalidMaxEntries,

    #[error("unknown memory scope: {name}")]
    UnknownScope { name: String },

    #[error("unknown memory composer: {name}")]
    UnknownComposer { name: String },

    #[error("unknown memory decomposer: {name}")]
    UnknownDecomposer { name: String },

    #[error("{context}: {source}")]
    Persistence {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn unknown_scope(name: impl Into<String>) -> Self {
        Self::UnknownScope { name: name.into() }
    }

    #[must_use]
    pub fn unknown_composer(name: impl Into<String>) -> Self {
        Self::UnknownComposer { name: name.into() }
    }

    #[must_use]
    pub fn unknown_decomposer(name: impl Into<String>) -> Self {
        Self::UnknownDecomposer { name: name.into() }
    }

    #[must_use]
    pub fn persistence(context: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Persistence {
            context: context.into(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
