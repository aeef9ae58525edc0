//! Background work with staleness tracking.
//!
//! Remote icon fetches and route calculations run as spawned tokio tasks. A
//! task never touches view state: it resolves to a value that is posted back
//! into the view loop together with the [`Generation`] it was issued under.
//! The owner then compares that generation with its [`GenerationCounter`] and
//! drops results that were superseded in the meantime.
//!
//! ```text
//! owner.advance() ─► Generation(7) ─► spawn_completion(fut) ─► loop ◄─ msg(7, value)
//!                                                               │
//!                                     owner.is_current(7)? ─────┘ apply : drop
//! ```

use std::fmt;
use std::future::Future;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// Identifies the request a completion belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(u64);

impl Generation {
    /// The generation before any request was issued.
    pub const INITIAL: Generation = Generation(0);

    /// Raw counter value, for logging.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen#{}", self.0)
    }
}

/// Monotonic counter; each `advance` invalidates every earlier generation.
#[derive(Debug, Default)]
pub struct GenerationCounter {
    current: u64,
}

impl GenerationCounter {
    /// Create a counter at [`Generation::INITIAL`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation and return it.
    pub fn advance(&mut self) -> Generation {
        self.current += 1;
        Generation(self.current)
    }

    /// The latest generation handed out.
    pub fn current(&self) -> Generation {
        Generation(self.current)
    }

    /// Whether `generation` is still the latest one.
    pub fn is_current(&self, generation: Generation) -> bool {
        generation.0 == self.current
    }
}

/// Run `future` in the background and post its mapped output to `tx`.
///
/// A closed receiver means the view was torn down; the result is dropped.
pub fn spawn_completion<F, T, M>(
    tx: UnboundedSender<M>,
    future: F,
    into_message: impl FnOnce(T) -> M + Send + 'static,
) -> JoinHandle<()>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
    M: Send + 'static,
{
    tokio::spawn(async move {
        let output = future.await;
        if tx.send(into_message(output)).is_err() {
            tracing::debug!("View loop closed before background task completed");
        }
    })
}
