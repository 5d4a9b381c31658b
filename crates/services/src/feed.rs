//! Combine-latest over two watch feeds.

use tokio::sync::watch;

/// Holds the latest value of two sources and yields a fresh pair whenever
/// either side publishes.
///
/// A side whose sender is gone keeps contributing its last value; the
/// combination ends once both senders are gone.
pub struct CombineLatest<A, B> {
    left: watch::Receiver<A>,
    right: watch::Receiver<B>,
    left_closed: bool,
    right_closed: bool,
}

enum Side {
    Left,
    Right,
}

impl<A: Clone, B: Clone> CombineLatest<A, B> {
    #[must_use]
    pub fn new(left: watch::Receiver<A>, right: watch::Receiver<B>) -> Self {
        Self {
            left,
            right,
            left_closed: false,
            right_closed: false,
        }
    }

    /// Latest pair, marking both sides as seen.
    pub fn current(&mut self) -> (A, B) {
        (
            self.left.borrow_and_update().clone(),
            self.right.borrow_and_update().clone(),
        )
    }

    /// Waits for either side to change and returns the latest pair.
    ///
    /// Updates landing on both sides before this is polled are conflated into
    /// one pair.
    pub async fn next(&mut self) -> Option<(A, B)> {
        loop {
            if self.left_closed && self.right_closed {
                return None;
            }

            let changed = tokio::select! {
                res = self.left.changed(), if !self.left_closed => res.map_err(|_| Side::Left),
                res = self.right.changed(), if !self.right_closed => res.map_err(|_| Side::Right),
            };

            match changed {
                Ok(()) => return Some(self.current()),
                Err(Side::Left) => self.left_closed = true,
                Err(Side::Right) => self.right_closed = true,
            }
        }
    }
}

/// Derives a feed from two others, recomputing `f` on every update of either.
///
/// The background task stops when every receiver of the derived feed is
/// dropped or both sources are gone.
///
/// # Panics
///
/// Panics if called outside a Tokio runtime.
pub fn combine_latest<A, B, C, F>(
    left: watch::Receiver<A>,
    right: watch::Receiver<B>,
    mut f: F,
) -> watch::Receiver<C>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Send + Sync + 'static,
    F: FnMut(&A, &B) -> C + Send + 'static,
{
    let mut combined = CombineLatest::new(left, right);
    let (a, b) = combined.current();
    let (tx, rx) = watch::channel(f(&a, &b));

    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = tx.closed() => break,
                next = combined.next() => match next {
                    Some((a, b)) => {
                        tx.send_replace(f(&a, &b));
                    }
                    None => break,
                },
            }
        }
    });

    rx
}
