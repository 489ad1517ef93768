use anyhow::anyhow;
use sentry_core::protocol::SpanStatus;
use std::any::Any;
use std::future::Future;

/// Runs `future` inside a Sentry transaction named `transaction_name`.
pub(crate) async fn with_sentry_transaction<F, R, E>(transaction_name: &str, future: F) -> Result<R, E>
where
    F: Future<Output = Result<R, E>>,
{
    let tx_ctx = sentry_core::TransactionContext::new(transaction_name, "queue.task");
    let tx = sentry_core::start_transaction(tx_ctx);

    let result = future.await;

    let status = if result.is_ok() {
        SpanStatus::Ok
    } else {
        SpanStatus::UnknownError
    };
    tx.set_status(status);
    tx.finish();

    result
}

/// Turns a panic payload into an error describing it.
pub(crate) fn try_to_extract_panic_info(info: &(dyn Any + Send + 'static)) -> anyhow::Error {
    if let Some(message) = info.downcast_ref::<&'static str>() {
        anyhow!("job panicked: {message}")
    } else if let Some(message) = info.downcast_ref::<String>() {
        anyhow!("job panicked: {message}")
    } else {
        anyhow!("job panicked")
    }
}
