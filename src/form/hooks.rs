//! Before/after step hooks.
//!
//! Hooks are registered per step number or against the wildcard key, which
//! matches every step. Dispatch always consults the wildcard hook first and
//! the step-specific hook second; the first one returning a response wins.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::form::response::FormResponse;
use crate::form::MultiStepForm;

/// Outcome of a hook: optionally a response that short-circuits dispatch
pub type HookResult = anyhow::Result<Option<FormResponse>>;

/// Anything that can run against the form at a lifecycle point
pub trait StepHook: Send + Sync {
    fn call(&self, form: &mut MultiStepForm) -> HookResult;
}

impl<F> StepHook for F
where
    F: Fn(&mut MultiStepForm) -> HookResult + Send + Sync,
{
    fn call(&self, form: &mut MultiStepForm) -> HookResult {
        self(form)
    }
}

/// Which step a hook is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HookKey {
    /// Every step
    Any,
    Step(u32),
}

impl From<u32> for HookKey {
    fn from(step: u32) -> Self {
        HookKey::Step(step)
    }
}

impl fmt::Display for HookKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookKey::Any => f.write_str("*"),
            HookKey::Step(n) => write!(f, "{n}"),
        }
    }
}

/// One hook per key; registering again replaces the previous hook
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: BTreeMap<HookKey, Arc<dyn StepHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: HookKey, hook: Arc<dyn StepHook>) {
        self.hooks.insert(key, hook);
    }

    pub fn get(&self, key: HookKey) -> Option<Arc<dyn StepHook>> {
        self.hooks.get(&key).cloned()
    }

    pub fn contains(&self, key: HookKey) -> bool {
        self.hooks.contains_key(&key)
    }

    /// Wildcard hook then the hook for `step`, in dispatch order
    pub fn lookup_order(step: u32) -> [HookKey; 2] {
        [HookKey::Any, HookKey::Step(step)]
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.hooks.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_form: &mut MultiStepForm) -> HookResult {
        Ok(None)
    }

    #[test]
    fn test_reregistering_overwrites() {
        let mut registry = HookRegistry::new();
        registry.insert(HookKey::Step(1), Arc::new(noop));
        registry.insert(HookKey::Step(1), Arc::new(noop));
        registry.insert(HookKey::Any, Arc::new(noop));

        assert_eq!(registry.len(), 2);
        assert!(registry.contains(HookKey::Any));
        assert!(registry.get(HookKey::Step(2)).is_none());
    }

    #[test]
    fn test_wildcard_is_consulted_first() {
        assert_eq!(
            HookRegistry::lookup_order(3),
            [HookKey::Any, HookKey::Step(3)]
        );
    }

    #[test]
    fn test_key_display() {
        assert_eq!(HookKey::Any.to_string(), "*");
        assert_eq!(HookKey::from(4).to_string(), "4");
    }
}
