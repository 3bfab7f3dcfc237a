//! Session phases and the only transitions allowed between them.

use std::fmt;

use common::CipherError;

/// Lifecycle position of a [`CipherSession`](super::CipherSession).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Uninitialized,
    Initialized,
    AadAccepted,
    DataStarted,
    Finalized,
}

/// Caller-visible operations that move a session between phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Initialize,
    UpdateAad,
    Update,
    Finalize,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Uninitialized => "UNINITIALIZED",
            Phase::Initialized => "INITIALIZED",
            Phase::AadAccepted => "AAD_ACCEPTED",
            Phase::DataStarted => "DATA_STARTED",
            Phase::Finalized => "FINALIZED",
        }
    }

    /// The phase reached by applying `event`, or `InvalidState`.
    ///
    /// `initialize` is accepted from every phase and always restarts the
    /// session. Repeated AAD calls are allowed until the first data call.
    pub fn advance(self, event: Event) -> Result<Phase, CipherError> {
        use Event as E;
        use Phase as P;

        match (self, event) {
            (_, E::Initialize) => Ok(P::Initialized),
            (P::Initialized | P::AadAccepted, E::UpdateAad) => Ok(P::AadAccepted),
            (P::Initialized | P::AadAccepted | P::DataStarted, E::Update) => Ok(P::DataStarted),
            (P::Initialized | P::AadAccepted | P::DataStarted, E::Finalize) => Ok(P::Finalized),
            (from, event) => Err(CipherError::InvalidState(describe(from, event))),
        }
    }
}

fn describe(from: Phase, event: Event) -> String {
    match (from, event) {
        (Phase::Uninitialized, _) => "session has not been initialized".into(),
        (Phase::DataStarted, Event::UpdateAad) => "AAD must be supplied before any data".into(),
        (Phase::Finalized, _) => "session is finalized; initialize it again first".into(),
        (from, event) => format!("{event:?} is not allowed in phase {from}"),
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHASES: [Phase; 5] = [
        Phase::Uninitialized,
        Phase::Initialized,
        Phase::AadAccepted,
        Phase::DataStarted,
        Phase::Finalized,
    ];

    #[test]
    fn happy_path() {
        let p = Phase::Uninitialized.advance(Event::Initialize).unwrap();
        let p = p.advance(Event::UpdateAad).unwrap();
        let p = p.advance(Event::UpdateAad).unwrap();
        assert_eq!(p, Phase::AadAccepted);
        let p = p.advance(Event::Update).unwrap();
        let p = p.advance(Event::Update).unwrap();
        assert_eq!(p, Phase::DataStarted);
        assert_eq!(p.advance(Event::Finalize).unwrap(), Phase::Finalized);
    }

    #[test]
    fn initialize_always_restarts() {
        for phase in PHASES {
            assert_eq!(phase.advance(Event::Initialize).unwrap(), Phase::Initialized);
        }
    }

    #[test]
    fn aad_after_data_rejected() {
        let err = Phase::DataStarted.advance(Event::UpdateAad).unwrap_err();
        assert!(matches!(err, CipherError::InvalidState(m) if m.contains("before any data")));
    }

    #[test]
    fn finalized_and_uninitialized_reject_work() {
        for event in [Event::UpdateAad, Event::Update, Event::Finalize] {
            assert!(Phase::Finalized.advance(event).is_err());
            assert!(Phase::Uninitialized.advance(event).is_err());
        }
    }

    #[test]
    fn display_uses_upper_snake_case() {
        assert_eq!(Phase::AadAccepted.to_string(), "AAD_ACCEPTED");
    }
}
