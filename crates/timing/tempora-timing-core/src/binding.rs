//! Target binding for animation outputs.
//!
//! The property layer owns attribute resolution; the timing core only asks
//! it, once, to turn a canonical target path into an opaque handle. An
//! animation whose target cannot be resolved is disabled rather than
//! allowed to crash the sampling loop.

/// Resolve canonical animation target paths into engine-specific handles.
pub trait TargetResolver {
    /// Return a stable handle for the path, or None when the target is
    /// unknown or not animatable.
    fn resolve(&mut self, path: &str) -> Option<String>;
}

impl<F> TargetResolver for F
where
    F: FnMut(&str) -> Option<String>,
{
    fn resolve(&mut self, path: &str) -> Option<String> {
        self(path)
    }
}
