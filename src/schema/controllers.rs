use std::collections::HashMap;
use std::fmt;

use crate::handler::{BoxedHandler, Handler};

/// Registry of handlers keyed by `operationId`.
///
/// Operations tagged with `x-swagger-router-controller: pets` may register as
/// either `"pets.listPets"` or just `"listPets"`; the qualified key wins.
#[derive(Clone, Default)]
pub struct Controllers {
    handlers: HashMap<String, BoxedHandler>,
}

impl Controllers {
    pub fn new() -> Self {
        Self { handlers: HashMap::new() }
    }

    /// Registers `handler` under `key`. Returns `self` for chaining.
    pub fn register(mut self, key: &str, handler: impl Handler) -> Self {
        self.handlers.insert(key.to_owned(), handler.into_boxed_handler());
        self
    }

    pub(crate) fn resolve(&self, controller: Option<&str>, operation_id: &str) -> Option<BoxedHandler> {
        controller
            .and_then(|c| self.handlers.get(&format!("{c}.{operation_id}")))
            .or_else(|| self.handlers.get(operation_id))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for Controllers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.handlers.keys().collect();
        keys.sort();
        f.debug_struct("Controllers").field("operations", &keys).finish()
    }
}
