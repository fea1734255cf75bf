pub mod cron;
pub mod enqueuer;

pub use cron::CronScheduler;
