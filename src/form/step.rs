//! Step declarations and response data.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::form::MultiStepForm;
use crate::validation::{parse_rules, Messages, Rule, RuleParseError, RuleSet};

/// Producer evaluated when a response is built
pub type DataProducer = Arc<dyn Fn(&MultiStepForm) -> Value + Send + Sync>;

/// A response data entry: fixed, or computed at response-build time
#[derive(Clone)]
pub enum DataValue {
    Static(Value),
    Lazy(DataProducer),
}

impl DataValue {
    pub fn lazy<F>(producer: F) -> Self
    where
        F: Fn(&MultiStepForm) -> Value + Send + Sync + 'static,
    {
        DataValue::Lazy(Arc::new(producer))
    }

    pub(crate) fn resolve(&self, form: &MultiStepForm) -> Value {
        match self {
            DataValue::Static(value) => value.clone(),
            DataValue::Lazy(producer) => producer(form),
        }
    }
}

impl fmt::Debug for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValue::Static(value) => f.debug_tuple("Static").field(value).finish(),
            DataValue::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

macro_rules! static_data_from {
    ($($ty:ty),*) => {
        $(impl From<$ty> for DataValue {
            fn from(value: $ty) -> Self {
                DataValue::Static(Value::from(value))
            }
        })*
    };
}

static_data_from!(Value, &str, String, bool, i64, u32, f64);

/// Ordered response data, keyed by name
pub type DataMap = BTreeMap<String, DataValue>;

/// Turn a JSON object into static data entries
pub fn static_data(map: Map<String, Value>) -> DataMap {
    map.into_iter()
        .map(|(k, v)| (k, DataValue::Static(v)))
        .collect()
}

/// Configuration of one declared step
#[derive(Debug, Clone, Default)]
pub struct StepConfig {
    pub rules: RuleSet,
    pub messages: Messages,
    pub data: DataMap,
    /// Arbitrary application metadata
    pub meta: Map<String, Value>,
}

impl StepConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add rules for a field in pipe syntax (`"required|max:255"`)
    pub fn rule(mut self, field: &str, pattern: &str) -> Result<Self, RuleParseError> {
        let rules = parse_rules(pattern)?;
        self.rules.entry(field.to_string()).or_default().extend(rules);
        Ok(self)
    }

    /// Add already-built rules for a field
    pub fn rules(mut self, field: &str, rules: Vec<Rule>) -> Self {
        self.rules.entry(field.to_string()).or_default().extend(rules);
        self
    }

    /// Custom message for `field.rule` or `rule`
    pub fn message(mut self, key: &str, message: &str) -> Self {
        self.messages.insert(key.to_string(), message.to_string());
        self
    }

    pub fn data(mut self, key: &str, value: impl Into<DataValue>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    pub fn meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.meta.insert(key.to_string(), value.into());
        self
    }
}

/// Steps keyed by their number
#[derive(Debug, Clone, Default)]
pub struct StepRegistry {
    steps: BTreeMap<u32, StepConfig>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a step; declaring the same number again replaces it
    pub fn insert(&mut self, step: u32, config: StepConfig) {
        self.steps.insert(step, config);
    }

    pub fn get(&self, step: u32) -> Option<&StepConfig> {
        self.steps.get(&step)
    }

    pub fn contains(&self, step: u32) -> bool {
        self.steps.contains_key(&step)
    }

    /// Highest declared step number, 1 when nothing is declared
    pub fn last(&self) -> u32 {
        self.steps.keys().next_back().copied().unwrap_or(1)
    }

    pub fn numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.steps.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_last_step_defaults_to_one() {
        let registry = StepRegistry::new();
        assert_eq!(registry.last(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_last_step_is_highest_number_not_insert_order() {
        let mut registry = StepRegistry::new();
        registry.insert(3, StepConfig::new());
        registry.insert(1, StepConfig::new());
        registry.insert(2, StepConfig::new());
        assert_eq!(registry.last(), 3);
        assert_eq!(registry.numbers().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_redeclaring_step_replaces_config() {
        let mut registry = StepRegistry::new();
        registry.insert(1, StepConfig::new().data("title", "first"));
        registry.insert(1, StepConfig::new().data("title", "second"));

        assert_eq!(registry.len(), 1);
        let data = &registry.get(1).unwrap().data;
        assert!(matches!(data.get("title"), Some(DataValue::Static(v)) if v == &json!("second")));
    }

    #[test]
    fn test_step_config_builder() {
        let config = StepConfig::new()
            .rule("name", "required|string")
            .unwrap()
            .rules("age", vec![Rule::Integer])
            .message("name.required", "Name please")
            .meta("section", "profile");

        assert_eq!(config.rules["name"], vec![Rule::Required, Rule::String]);
        assert_eq!(config.rules["age"], vec![Rule::Integer]);
        assert_eq!(config.messages["name.required"], "Name please");
        assert_eq!(config.meta["section"], json!("profile"));
        assert!(StepConfig::new().rule("x", "bogus").is_err());
    }
}
