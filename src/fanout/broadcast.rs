use std::time::Duration;

use tokio::sync::mpsc;

/// Collects items from `receiver` until the shared deadline elapses, or until
/// the channel closes when no deadline is given.
///
/// Deadline expiry is the normal termination condition, not an error. Items
/// already buffered in the channel when the deadline fires are drained before
/// the collection is declared complete.
pub async fn collect_until_deadline<T>(
    receiver: &mut mpsc::Receiver<T>,
    deadline: Option<Duration>,
) -> Vec<T> {
    let mut collected = Vec::new();

    let Some(deadline) = deadline else {
        while let Some(item) = receiver.recv().await {
            collected.push(item);
        }
        return collected;
    };

    let expiry = tokio::time::sleep(deadline);
    tokio::pin!(expiry);

    loop {
        tokio::select! {
            item = receiver.recv() => match item {
                Some(item) => collected.push(item),
                None => return collected,
            },
            () = &mut expiry => break,
        }
    }

    // The deadline fired mid-wait; keep whatever the sender already queued.
    while let Ok(item) = receiver.try_recv() {
        collected.push(item);
    }

    collected
}
