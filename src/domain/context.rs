use serde_json::{Map, Value};
use std::sync::Arc;

/// Read-only snapshot of the process environment, taken once at startup.
///
/// Stored as a JSON object of strings so expressions can borrow it as a
/// value without rebuilding it per record.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvSnapshot(Value);

impl EnvSnapshot {
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: Map<String, Value> = vars
            .into_iter()
            .map(|(name, value)| (name.into(), Value::String(value.into())))
            .collect();
        EnvSnapshot(Value::Object(map))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl Default for EnvSnapshot {
    fn default() -> Self {
        EnvSnapshot(Value::Object(Map::new()))
    }
}

/// Bindings visible to an expression: `input` and `env`.
#[derive(Debug, Clone)]
pub struct Context {
    input: Value,
    env: Arc<EnvSnapshot>,
}

impl Context {
    pub fn new(input: Value, env: Arc<EnvSnapshot>) -> Self {
        Self { input, env }
    }

    pub fn input(&self) -> &Value {
        &self.input
    }

    pub fn env(&self) -> &EnvSnapshot {
        &self.env
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snapshot_is_an_object_of_strings() {
        let env = EnvSnapshot::from_vars([("TOKEN", "abc123"), ("EMPTY", "")]);
        assert_eq!(env.as_value(), &json!({"TOKEN": "abc123", "EMPTY": ""}));
    }

    #[test]
    fn default_snapshot_is_empty_object() {
        assert_eq!(EnvSnapshot::default().as_value(), &json!({}));
    }
}
