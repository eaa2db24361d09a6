/// Generates request and insertion ids. Typically a UUID generator.
///
/// ```
/// # use delivery_client::IdGenerator;
/// # use std::sync::atomic::{AtomicU64, Ordering};
/// let counter = AtomicU64::new(0);
/// let ids = move || format!("id-{}", counter.fetch_add(1, Ordering::Relaxed));
/// assert_eq!(ids.generate_id(), "id-0");
/// ```
pub trait IdGenerator: Send + Sync {
    /// Return a new unique, non-empty id.
    fn generate_id(&self) -> String;
}

impl<T: Fn() -> String + Send + Sync> IdGenerator for T {
    fn generate_id(&self) -> String {
        self()
    }
}
