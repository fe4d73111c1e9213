//! Method handler types and map-style registration.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use serde_json::Value;

use crate::error::HandlerError;

/// Future returned by an exposed method handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value, HandlerError>>>>;

/// An exposed method handler.
///
/// Handlers receive the call's positional params and may settle
/// immediately or suspend; either way the reply is sent once the returned
/// future completes.
pub type MethodHandler = Rc<dyn Fn(Vec<Value>) -> HandlerFuture>;

/// Box an async closure into a [`MethodHandler`].
pub fn handler<F, Fut>(f: F) -> MethodHandler
where
    F: Fn(Vec<Value>) -> Fut + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + 'static,
{
    Rc::new(move |params| Box::pin(f(params)))
}

/// A batch of method registrations, applied in one `expose_all` call.
///
/// The map counterpart of [`Pair::expose`](crate::Pair::expose):
///
/// ```ignore
/// let mut methods = MethodMap::new();
/// methods.insert("add", |params| async move { /* … */ });
/// methods.insert("echo", |params| async move { Ok(params.into_iter().next().unwrap_or(Value::Null)) });
/// pair.expose_all(methods);
/// ```
#[derive(Default)]
pub struct MethodMap {
    entries: HashMap<String, MethodHandler>,
}

impl MethodMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler under `name`, overwriting any previous entry.
    pub fn insert<F, Fut>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(Vec<Value>) -> Fut + 'static,
        Fut: Future<Output = Result<Value, HandlerError>> + 'static,
    {
        self.entries.insert(name.into(), handler(f));
        self
    }

    /// Number of registrations in the batch.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> HashMap<String, MethodHandler> {
        self.entries
    }
}
