pub mod api_refresh;
pub mod digest;
pub mod nudge;
pub mod reminder;

use super::model::JobKind;
use super::registry::JobRegistry;

/// Builds the registry wiring every specified kind (§4.E) to its handler.
pub fn build_registry() -> JobRegistry {
    let mut registry = JobRegistry::new();
    registry.register(JobKind::ReminderWorkItemNotBefore, |payload, deps| reminder::handle(payload, deps));
    registry.register(JobKind::NudgeWorkItemNotAfter, |payload, deps| nudge::handle(payload, deps));
    registry.register(JobKind::ApiRefresh, |payload, deps| api_refresh::handle(payload, deps));
    registry.register(JobKind::DigestDaily, |payload, deps| digest::handle(payload, deps));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_registry_registers_every_specified_kind() {
        let registry = build_registry();
        assert!(registry.is_registered(JobKind::ReminderWorkItemNotBefore));
        assert!(registry.is_registered(JobKind::NudgeWorkItemNotAfter));
        assert!(registry.is_registered(JobKind::ApiRefresh));
        assert!(registry.is_registered(JobKind::DigestDaily));
    }
}
