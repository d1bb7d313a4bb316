//! Once-only failure latch shared by the stages of one pipeline run.

use std::sync::OnceLock;

use tracing::debug;

use super::AuthFailure;

/// Holds the first failure of a pipeline run. Later trips are dropped.
#[derive(Debug, Default)]
pub struct FailureLatch {
    first: OnceLock<AuthFailure>,
}

impl FailureLatch {
    /// An untripped latch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `failure` unless one is already recorded. Returns whether this
    /// call was the one that tripped the latch.
    pub fn trip(&self, failure: AuthFailure) -> bool {
        match self.first.set(failure) {
            Ok(()) => true,
            Err(late) => {
                debug!(failure = %late, "Dropping failure after latch already tripped");
                false
            }
        }
    }

    /// Whether a failure has been recorded.
    #[must_use]
    pub fn is_tripped(&self) -> bool {
        self.first.get().is_some()
    }

    /// The recorded failure.
    #[must_use]
    pub fn failure(&self) -> Option<&AuthFailure> {
        self.first.get()
    }

    /// Consume the latch.
    #[must_use]
    pub fn into_failure(self) -> Option<AuthFailure> {
        self.first.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn first_trip_wins() {
        let latch = FailureLatch::new();
        assert!(!latch.is_tripped());

        assert!(latch.trip(AuthFailure::InvalidToken("expired".into())));
        assert!(!latch.trip(AuthFailure::Internal("late".into())));

        assert_eq!(
            latch.into_failure(),
            Some(AuthFailure::InvalidToken("expired".into()))
        );
    }

    #[test]
    fn concurrent_trips_record_exactly_one() {
        // GIVEN: one latch shared by many threads
        let latch = Arc::new(FailureLatch::new());

        // WHEN: all of them trip at once
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let latch = Arc::clone(&latch);
                std::thread::spawn(move || latch.trip(AuthFailure::Internal(format!("t{i}"))))
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        // THEN: exactly one trip took effect
        assert_eq!(wins, 1);
        assert!(latch.failure().is_some());
    }
}
