use std::time::Instant;

/// Single-slot timer. Scheduling replaces whatever was pending, so at most
/// one value is ever waiting.
#[derive(Debug)]
pub(crate) struct Debouncer<T> {
    pending: Option<(Instant, T)>,
}

impl<T> Default for Debouncer<T> {
    fn default() -> Self {
        Self { pending: None }
    }
}

impl<T> Debouncer<T> {
    pub(crate) fn schedule(&mut self, at: Instant, value: T) {
        self.pending = Some((at, value));
    }

    pub(crate) fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(at, _)| *at)
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Takes the value once its deadline has passed.
    pub(crate) fn take_due(&mut self, now: Instant) -> Option<T> {
        match self.pending {
            Some((at, _)) if at <= now => self.pending.take().map(|(_, v)| v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn second_request_replaces_first() {
        let start = Instant::now();
        let mut d = Debouncer::default();
        d.schedule(start + Duration::from_millis(100), "forward");
        d.schedule(start + Duration::from_millis(150), "reverse");

        assert_eq!(d.take_due(start + Duration::from_millis(120)), None);
        assert_eq!(d.take_due(start + Duration::from_millis(150)), Some("reverse"));
        assert_eq!(d.take_due(start + Duration::from_secs(5)), None, "fires once");
    }

    #[test]
    fn cancel_clears_slot() {
        let start = Instant::now();
        let mut d = Debouncer::default();
        assert!(!d.cancel());
        d.schedule(start, 1);
        assert_eq!(d.deadline(), Some(start));
        assert!(d.cancel());
        assert!(!d.is_pending());
        assert_eq!(d.take_due(start + Duration::from_secs(1)), None);
    }
}
