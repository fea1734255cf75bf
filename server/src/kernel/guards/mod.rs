pub mod dedup;
pub mod gate;
pub mod quiet_hours;
pub mod rate_limit;

pub use dedup::dedup_key;
pub use gate::{gated_enqueue, EmitRequest, GateOutcome};
pub use quiet_hours::{QuietHours, QuietHoursDecision, Urgency};
pub use rate_limit::RateDecision;
