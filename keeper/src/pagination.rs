//! Turns cursor-paginated store listings into lazy streams.

use crate::domain::Page;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use shared::Result;
use std::future::Future;

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Stream every item of a paginated listing, fetching one page at a time.
///
/// `fetch` receives the cursor of the page to load (None for the first one).
/// The stream ends after the page that carries no cursor, or right after the
/// first failed fetch, which is yielded as an `Err` item.
pub fn paginate<T, F, Fut>(fetch: F) -> BoxStream<'static, Result<T>>
where
    T: Send + 'static,
    F: FnMut(Option<String>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Page<T>>> + Send + 'static,
{
    stream::try_unfold((Cursor::Start, fetch), |(cursor, mut fetch)| async move {
        let cursor = match cursor {
            Cursor::Start => None,
            Cursor::Next(cursor) => Some(cursor),
            Cursor::Done => return Ok(None),
        };

        let page = fetch(cursor).await?;
        let next = match page.cursor {
            Some(cursor) => Cursor::Next(cursor),
            None => Cursor::Done,
        };

        let items = stream::iter(page.items.into_iter().map(Ok::<T, shared::Error>));
        Ok(Some((items, (next, fetch))))
    })
    .try_flatten()
    .boxed()
}
