use crate::application::StatusChange;
use std::future::Future;
use tracing::info;

/// Subject under which status changes are announced.
pub const STATUS_CHANGED_SUBJECT: &str = "applications.changed";

/// Announces application status changes to the rest of the system.
///
/// Delivery is best effort. A failed notification never undoes the job update
/// that triggered it.
pub trait Notifier: Send + Sync + 'static {
    /// Announces that an application moved to a new status.
    fn application_status_changed(
        &self,
        change: &StatusChange,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// [`Notifier`] that publishes each change as a structured log event.
///
/// The event carries the JSON payload and uses [`STATUS_CHANGED_SUBJECT`] as
/// its target, so a log shipper can route it like a bus message.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    async fn application_status_changed(&self, change: &StatusChange) -> anyhow::Result<()> {
        let payload = serde_json::to_string(change)?;
        info!(
            target: STATUS_CHANGED_SUBJECT,
            {
                application.id = %change.id,
                application.status = %change.status,
                %payload,
            },
            "Application status changed"
        );
        Ok(())
    }
}
