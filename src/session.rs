//! Session collaborator contract.
//!
//! The form reads and writes its state under a namespace key of a per-user
//! key/value store. Keys are dotted paths (`"checkout.form_step"`), so a
//! namespace is a JSON object nested under its first segment.
//!
//! Persistence is the host's concern. [`MemorySession`] keeps everything in a
//! JSON map and is what the HTTP adapter loads from and saves back to its
//! store around each request.

use serde_json::{Map, Value};

/// Key of the flash bag inside the persisted attributes
pub const FLASH_KEY: &str = "_flash";

/// Flashed submitted input, read back as old input on the next request
pub const OLD_INPUT_KEY: &str = "old_input";

/// Flashed validation errors, read back on the next request
pub const ERRORS_KEY: &str = "errors";

/// Per-user key/value store addressed by dotted paths
pub trait Session: Send + Sync {
    /// Value at `key`, if present
    fn get(&self, key: &str) -> Option<Value>;

    /// Store `value` at `key`, creating intermediate objects
    fn put(&mut self, key: &str, value: Value);

    /// Remove `key`
    fn forget(&mut self, key: &str);

    /// Snapshot of every stored attribute
    fn all(&self) -> Map<String, Value>;

    /// Value flashed under `key` by the previous request
    fn flashed(&self, key: &str) -> Option<Value>;

    /// Make `value` available under `key` on the next request only
    fn flash(&mut self, key: &str, value: Value) {
        self.put(&format!("{FLASH_KEY}.{key}"), value);
    }

    /// Input flashed by the previous request
    fn old_input(&self, key: &str) -> Option<Value> {
        match self.flashed(OLD_INPUT_KEY) {
            Some(Value::Object(input)) => lookup(&input, key).cloned(),
            _ => None,
        }
    }

    /// True when `key` exists and is not null
    fn has(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| !v.is_null())
    }

    /// Value at `key` or `default`
    fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    /// Shallow-merge `values` into the object at `key`
    fn merge(&mut self, key: &str, values: Map<String, Value>) {
        let mut current = match self.get(key) {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        current.extend(values);
        self.put(key, Value::Object(current));
    }

    /// Add `by` to the integer at `key` (missing counts as zero)
    fn increment(&mut self, key: &str, by: i64) -> i64 {
        let current = self
            .get(key)
            .and_then(|v| match v {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .unwrap_or(0);
        let next = current + by;
        self.put(key, Value::from(next));
        next
    }
}

/// In-memory session with flash support
#[derive(Debug, Clone, Default)]
pub struct MemorySession {
    attributes: Map<String, Value>,
    /// Flash bag carried in from the previous request
    flashed: Map<String, Value>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a session from persisted attributes.
    ///
    /// Anything flashed by the previous request is moved out of the attributes
    /// so it is visible for this request only.
    pub fn from_attributes(mut attributes: Map<String, Value>) -> Self {
        let flashed = match attributes.remove(FLASH_KEY) {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        Self {
            attributes,
            flashed,
        }
    }

    /// Seed values by dotted key, mostly for tests and fixtures
    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.put(key, value);
        self
    }

    /// Make `input` available as old input on the next request
    pub fn flash_input(&mut self, input: Map<String, Value>) {
        self.flash(OLD_INPUT_KEY, Value::Object(input));
    }

    /// Make validation errors available on the next request
    pub fn flash_errors(&mut self, errors: Value) {
        self.flash(ERRORS_KEY, errors);
    }

    /// Attributes to persist, including anything flashed for the next request
    pub fn into_attributes(self) -> Map<String, Value> {
        self.attributes
    }
}

impl Session for MemorySession {
    fn get(&self, key: &str) -> Option<Value> {
        lookup(&self.attributes, key).cloned()
    }

    fn put(&mut self, key: &str, value: Value) {
        insert(&mut self.attributes, key, value);
    }

    fn forget(&mut self, key: &str) {
        remove(&mut self.attributes, key);
    }

    fn all(&self) -> Map<String, Value> {
        self.attributes.clone()
    }

    fn flashed(&self, key: &str) -> Option<Value> {
        self.flashed.get(key).cloned()
    }
}

/// Resolve a dotted path inside a JSON object
pub fn lookup<'a>(root: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    if let Some(value) = root.get(key) {
        return Some(value);
    }
    let mut segments = key.split('.');
    let mut current = root.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Insert at a dotted path, replacing non-object intermediates
pub fn insert(root: &mut Map<String, Value>, key: &str, value: Value) {
    let mut segments: Vec<&str> = key.split('.').collect();
    let Some(last) = segments.pop() else {
        return;
    };

    let mut current = root;
    for segment in segments {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = match entry {
            Value::Object(map) => map,
            _ => unreachable!("entry was just made an object"),
        };
    }
    current.insert(last.to_string(), value);
}

fn remove(root: &mut Map<String, Value>, key: &str) {
    match key.rsplit_once('.') {
        None => {
            root.remove(key);
        }
        Some((parent, last)) => {
            let mut current = root;
            for segment in parent.split('.') {
                current = match current.get_mut(segment) {
                    Some(Value::Object(map)) => map,
                    _ => return,
                };
            }
            current.remove(last);
        }
    }
}
