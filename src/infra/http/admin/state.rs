use std::sync::Arc;

use crate::cache::CacheInvalidator;

#[derive(Clone)]
pub struct AdminState {
    pub invalidator: Arc<CacheInvalidator>,
}

impl AdminState {
    pub fn new(invalidator: CacheInvalidator) -> Self {
        Self {
            invalidator: Arc::new(invalidator),
        }
    }
}
