#![forbid(unsafe_code)]

pub mod adapter;
pub mod cache;
pub mod entry;
pub mod error;

pub use error::{StoreError, StoreErrorKind, StoreResult};

/// The outcome of one operation against the repository.
///
/// Ref advancement is an explicit return value: reads carry the commit id
/// the ref resolved to, mutations carry the commit id they produced, so
/// callers can pin subsequent reads to a concrete commit.
#[derive(Clone, Debug)]
pub struct Resolved<T> {
    pub value: T,
    pub resolved_ref: String,
}

impl<T> Resolved<T> {
    pub fn new(value: T, resolved_ref: impl Into<String>) -> Self {
        Self {
            value,
            resolved_ref: resolved_ref.into(),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resolved<U> {
        Resolved {
            value: f(self.value),
            resolved_ref: self.resolved_ref,
        }
    }
}
