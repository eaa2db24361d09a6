use crate::{Error, Result};

/// Receives every validation and remote-call error.
///
/// The handler decides how severe an error is: returning `Ok(())` lets the client continue with
/// its best available result, returning `Err` aborts the operation and hands the error back to the
/// caller.
pub trait ErrorHandler: Send + Sync {
    /// Handle `error`.
    fn handle_error(&self, error: Error) -> Result<()>;
}

impl<T: Fn(Error) -> Result<()> + Send + Sync> ErrorHandler for T {
    fn handle_error(&self, error: Error) -> Result<()> {
        self(error)
    }
}

/// Hands every error back to the caller.
///
/// Useful in development and tests, where malformed requests should fail loudly.
pub struct RethrowErrors;

impl ErrorHandler for RethrowErrors {
    fn handle_error(&self, error: Error) -> Result<()> {
        Err(error)
    }
}

/// Logs every error and continues. Recommended for production.
pub struct LogErrors;

impl ErrorHandler for LogErrors {
    fn handle_error(&self, error: Error) -> Result<()> {
        log::error!(target: "delivery_client", "{error}");
        Ok(())
    }
}
