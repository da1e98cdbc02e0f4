use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Caller-supplied callback, shared between client components.
pub type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Invoke an observer, discarding any panic it raises.
pub(crate) fn notify<T: ?Sized>(name: &'static str, observer: &(dyn Fn(&T) + Send + Sync), value: &T) {
    if catch_unwind(AssertUnwindSafe(|| observer(value))).is_err() {
        tracing::debug!(observer = name, "observer panicked; ignoring");
    }
}
