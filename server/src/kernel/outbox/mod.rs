pub mod delivery;
pub mod model;
pub mod signing;
pub mod ssrf;
pub mod store;

pub use delivery::OutboxDelivery;
pub use model::OutboxMessage;
pub use store::{OutboxStore, PostgresOutboxStore};
