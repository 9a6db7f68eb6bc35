//! Price watch service: periodically checks storefront feeds for watched
//! games and mails one summary per platform.

pub mod config;
pub mod cycle;
pub mod formatters;
pub mod mailer;
pub mod scheduler;

pub use config::{Config, MailConfig};
pub use cycle::{run_cycle, CycleReport};
pub use mailer::{MailConnection, MailConnector, MailError, MailSession, SmtpConnector};
pub use scheduler::CycleScheduler;
