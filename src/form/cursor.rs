//! Step cursor and access predicates.
//!
//! The committed step lives in the session as `form_step`; the requested step
//! comes from the incoming request and is untrusted. Predicates on step
//! numbers that were never declared always answer with the fallback.

use serde_json::Value;

use crate::form::{MultiStepForm, FORM_STEP};
use crate::validation;

/// Parse a step number from a session or request value
pub(crate) fn step_number(value: &Value) -> Option<u32> {
    let number = validation::as_number(value)?;
    if number < 0.0 || number > f64::from(u32::MAX) {
        return None;
    }
    Some(number.trunc() as u32)
}

impl MultiStepForm {
    /// Committed step, 1 when the session holds nothing usable
    pub fn current_step(&self) -> u32 {
        self.session
            .get(&self.key(FORM_STEP))
            .as_ref()
            .and_then(step_number)
            .unwrap_or(1)
    }

    /// Step named by the request's `form_step` field, 1 when absent or malformed
    pub fn requested_step(&self) -> u32 {
        self.request
            .input(FORM_STEP)
            .and_then(step_number)
            .unwrap_or(1)
    }

    /// Highest declared step, 1 when no steps are declared
    pub fn last_step(&self) -> u32 {
        self.steps.last()
    }

    pub fn is_step(&self, step: u32) -> bool {
        self.current_step() == step
    }

    pub fn is_last_step(&self) -> bool {
        self.is_step(self.last_step())
    }

    /// `active` when `step` is declared and ahead of the committed step
    pub fn is_future<T>(&self, step: u32, active: T, fallback: T) -> T {
        if self.steps.contains(step) && self.current_step() < step {
            active
        } else {
            fallback
        }
    }

    /// `active` when `step` is declared and behind the committed step
    pub fn is_past<T>(&self, step: u32, active: T, fallback: T) -> T {
        if self.steps.contains(step) && self.current_step() > step {
            active
        } else {
            fallback
        }
    }

    /// `active` when `step` is declared and is the committed step
    pub fn is_active<T>(&self, step: u32, active: T, fallback: T) -> T {
        if self.steps.contains(step) && self.current_step() == step {
            active
        } else {
            fallback
        }
    }

    /// Highest step a submission may claim: the next declared step, or the
    /// committed one when there is no next step
    pub fn next_accessible_step(&self) -> u32 {
        let next = self.current_step() + 1;
        if self.is_future(next, true, false) {
            next
        } else {
            self.current_step()
        }
    }

    /// URL of the previous step for "back" links.
    ///
    /// `None` unless backward navigation is enabled and the previous step is
    /// declared and behind the committed one.
    pub fn prev_step_url(&self) -> Option<String> {
        let prev = self.current_step().saturating_sub(1);
        if !self.can_go_back || !self.is_past(prev, true, false) {
            return None;
        }
        Some(
            self.request
                .full_url_with_query(&[(FORM_STEP, prev.to_string())]),
        )
    }
}
