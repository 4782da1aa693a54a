use crate::domain::context::{Context, EnvSnapshot};
use serde_json::Value;
use std::sync::Arc;

/// Builds the per-record evaluation context around a shared env snapshot.
#[derive(Debug, Clone)]
pub struct EnvironmentBinder {
    env: Arc<EnvSnapshot>,
}

impl EnvironmentBinder {
    pub fn new(env: EnvSnapshot) -> Self {
        Self { env: Arc::new(env) }
    }

    pub fn bind(&self, record: Value) -> Context {
        Context::new(record, Arc::clone(&self.env))
    }
}
