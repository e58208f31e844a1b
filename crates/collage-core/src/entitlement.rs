//! Premium entitlement: decides whether exports carry the watermark.

use crate::error::{CollageError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

/// Answers whether the user owns the premium (no watermark) entitlement.
///
/// Implementations may fail; callers treat a failure as "not purchased".
pub trait Entitlement: Send + Sync {
    fn is_purchased(&self) -> Result<bool>;
}

/// Fixed answer, for tests and headless hosts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaticEntitlement(pub bool);

impl Entitlement for StaticEntitlement {
    fn is_purchased(&self) -> Result<bool> {
        Ok(self.0)
    }
}

/// Flag that a purchase flow can flip while sessions hold a clone.
#[derive(Debug, Clone, Default)]
pub struct SharedEntitlement {
    purchased: Arc<AtomicBool>,
}

impl SharedEntitlement {
    pub fn new(purchased: bool) -> Self {
        Self {
            purchased: Arc::new(AtomicBool::new(purchased)),
        }
    }

    pub fn set_purchased(&self, purchased: bool) {
        self.purchased.store(purchased, Ordering::SeqCst);
    }
}

impl Entitlement for SharedEntitlement {
    fn is_purchased(&self) -> Result<bool> {
        Ok(self.purchased.load(Ordering::SeqCst))
    }
}

/// Entitlement backend that is unreachable. Always errors.
#[derive(Debug, Clone, Default)]
pub struct UnavailableEntitlement {
    pub reason: String,
}

impl Entitlement for UnavailableEntitlement {
    fn is_purchased(&self) -> Result<bool> {
        Err(CollageError::Entitlement(self.reason.clone()))
    }
}

/// Consults `entitlement` once. Errors count as not purchased.
pub fn is_purchased_or_default(entitlement: &dyn Entitlement) -> bool {
    match entitlement.is_purchased() {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "entitlement check failed; applying watermark");
            false
        }
    }
}

/// Watermark caption to stamp, or `None` when the export is entitled to be clean.
pub fn resolve_watermark(entitlement: &dyn Entitlement, text: &str) -> Option<String> {
    if is_purchased_or_default(entitlement) {
        None
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_fails_closed() {
        let e = UnavailableEntitlement {
            reason: "store offline".into(),
        };
        assert_eq!(resolve_watermark(&e, "wm"), Some("wm".to_string()));
    }

    #[test]
    fn shared_flag_is_seen_by_clones() {
        let e = SharedEntitlement::new(false);
        let clone = e.clone();
        assert!(!is_purchased_or_default(&clone));
        e.set_purchased(true);
        assert!(is_purchased_or_default(&clone));
        assert_eq!(resolve_watermark(&clone, "wm"), None);
    }
}
