use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Input line did not follow `sender[@group]: text`.
    #[error("malformed message line: {line}")]
    MalformedLine { line: String },
}

impl Error {
    #[must_use]
    pub fn malformed_line(line: impl Into<String>) -> Self {
        Self::MalformedLine { line: line.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can be built from a plain message.
pub trait FromMessage: Sized {
    fn from_message(message: String) -> Self;
}

/// Defines a crate-local `Context` extension for `Result`, for crates whose
/// `Error` implements [`FromMessage`]. Expands to a trait that prefixes the
/// underlying error's text with the given context.
#[macro_export]
macro_rules! impl_context {
    () => {
        pub trait Context<T> {
            fn context(self, context: impl Into<String>) -> Result<T>;

            fn with_context<C: Into<String>>(self, f: impl FnOnce() -> C) -> Result<T>;
        }

        impl<T, E: std::fmt::Display> Context<T> for std::result::Result<T, E> {
            fn context(self, context: impl Into<String>) -> Result<T> {
                let context = context.into();
                self.with_context(|| context)
            }

            fn with_context<C: Into<String>>(self, f: impl FnOnce() -> C) -> Result<T> {
                self.map_err(|source| {
                    let message = format!("{}: {source}", f().into());
                    <Error as $crate::FromMessage>::from_message(message)
                })
            }
        }
    };
}
