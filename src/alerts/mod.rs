/// Alert cooldown, formatting and delivery
pub mod channels;
pub mod cooldown;
pub mod dispatcher;
pub mod formatter;

pub use channels::{LogChannel, MockChannel, NotificationChannel, WebhookChannel};
pub use cooldown::AlertCoordinator;
pub use dispatcher::{
    AlertDispatcher, DispatchOutcome, RecordPolicy, FAILURE_CATEGORY, REPORT_CATEGORY,
};
pub use formatter::{format_failure, format_report, AlertMessage};
