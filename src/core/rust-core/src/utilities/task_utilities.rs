use futures::{StreamExt, stream::FuturesUnordered};
use tokio_util::sync::CancellationToken;

use crate::errors::{NexusError, Result};

/// Awaits all futures and fails fast: the first error drops the remaining
/// futures (cancelling them at their next suspension point) and is returned.
/// Results are returned in input order.
///
/// Callers which want sibling failures to be non-fatal wrap the individual
/// future so that only fatal errors (out-of-memory, cancellation) surface.
pub async fn when_all_fail_fast<T, F>(
    futures: Vec<F>,
    cancellation_token: &CancellationToken,
) -> Result<Vec<T>>
where
    F: Future<Output = Result<T>>,
    T: Send,
{
    let mut ordered: Vec<Option<T>> = Vec::new();
    ordered.resize_with(futures.len(), || None);

    let mut pending = futures
        .into_iter()
        .enumerate()
        .map(|(index, future)| async move { (index, future.await) })
        .collect::<FuturesUnordered<_>>();

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                return Err(NexusError::Cancelled);
            }

            next = pending.next() => {
                match next {
                    Some((index, Ok(value))) => ordered[index] = Some(value),
                    Some((_, Err(error))) => return Err(error),
                    None => break,
                }
            }
        }
    }

    Ok(ordered.into_iter().flatten().collect())
}
