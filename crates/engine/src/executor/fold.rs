//! Sequential async fold.

use std::future::Future;

/// Folds `items` left to right, awaiting each application before the next.
///
/// `guard` checks the accumulator before every application and once more on
/// the final accumulator, converting it into the value handed on. The first
/// error from either closure stops the fold.
pub async fn sequential_fold<I, A, V, E, G, F, Fut>(items: I, initial: A, mut guard: G, mut apply: F) -> Result<V, E>
where
    I: IntoIterator,
    G: FnMut(A) -> Result<V, E>,
    F: FnMut(I::Item, V) -> Fut,
    Fut: Future<Output = Result<A, E>>,
{
    let mut accumulator = initial;
    for item in items {
        let value = guard(accumulator)?;
        accumulator = apply(item, value).await?;
    }
    guard(accumulator)
}
