use std::sync::{Arc, Mutex};

use crate::errors::HitReactWarning;

/// Receives runtime warnings, e.g. to surface them in an editor.
pub trait HitReactNotifier: Send + Sync {
    fn notify(&self, warning: &HitReactWarning);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl HitReactNotifier for NoopNotifier {
    fn notify(&self, _warning: &HitReactWarning) {}
}

/// Keeps every warning it receives. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct CollectingNotifier {
    warnings: Arc<Mutex<Vec<HitReactWarning>>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns the collected warnings, oldest first.
    pub fn take(&self) -> Vec<HitReactWarning> {
        match self.warnings.lock() {
            Ok(mut warnings) => std::mem::take(&mut *warnings),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl HitReactNotifier for CollectingNotifier {
    fn notify(&self, warning: &HitReactWarning) {
        match self.warnings.lock() {
            Ok(mut warnings) => warnings.push(warning.clone()),
            Err(poisoned) => poisoned.into_inner().push(warning.clone()),
        }
    }
}
