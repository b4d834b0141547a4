//! Checkpoint and rollback of in-memory state.

/// State that can be captured and later restored wholesale.
pub trait Transactional {
    /// Captured state.
    type Snapshot;

    /// Captures the current state.
    fn snapshot(&self) -> Self::Snapshot;

    /// Replaces the current state with a captured one.
    fn restore(&mut self, snapshot: Self::Snapshot);
}

/// Runs `f` against two participants, restoring both if it fails.
pub fn atomically<A, B, T, E>(
    a: &mut A,
    b: &mut B,
    f: impl FnOnce(&mut A, &mut B) -> Result<T, E>,
) -> Result<T, E>
where
    A: Transactional,
    B: Transactional,
{
    let snapshot_a = a.snapshot();
    let snapshot_b = b.snapshot();
    let result = f(a, b);
    if result.is_err() {
        a.restore(snapshot_a);
        b.restore(snapshot_b);
    }
    result
}
