//! Skip reason tracking for provider selection diagnostics.

use crate::models::ProviderId;

/// Why a provider was skipped during fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Provider requires an API key and none is configured.
    MissingCredential,

    /// The local call ledger has no budget left in the current window.
    RateLimited,

    /// Provider doesn't serve the requested interval.
    UnsupportedInterval,

    /// Provider doesn't implement the requested operation.
    NotSupported,
}

/// Outcome of a single provider attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    Skipped(SkipReason),
    /// The provider answered with nothing usable.
    Empty,
    Error(String),
    Success,
}

/// Record of a single provider attempt during a fetch.
#[derive(Clone, Debug)]
pub struct ProviderAttempt {
    pub provider_id: ProviderId,
    pub outcome: AttemptOutcome,
}

/// Detailed result of a fetch operation with skip diagnostics.
#[derive(Clone, Debug, Default)]
pub struct FetchDiagnostics {
    pub attempts: Vec<ProviderAttempt>,
}

impl FetchDiagnostics {
    pub fn new() -> Self {
        Self {
            attempts: Vec::new(),
        }
    }

    fn push(&mut self, provider_id: ProviderId, outcome: AttemptOutcome) {
        self.attempts.push(ProviderAttempt {
            provider_id,
            outcome,
        });
    }

    pub fn record_skip(&mut self, provider_id: ProviderId, reason: SkipReason) {
        self.push(provider_id, AttemptOutcome::Skipped(reason));
    }

    pub fn record_empty(&mut self, provider_id: ProviderId) {
        self.push(provider_id, AttemptOutcome::Empty);
    }

    pub fn record_error(&mut self, provider_id: ProviderId, error: String) {
        self.push(provider_id, AttemptOutcome::Error(error));
    }

    pub fn record_success(&mut self, provider_id: ProviderId) {
        self.push(provider_id, AttemptOutcome::Success);
    }

    /// Summary for logging/debugging.
    pub fn summary(&self) -> String {
        if self.attempts.is_empty() {
            return "no providers".to_string();
        }

        self.attempts
            .iter()
            .map(|a| match &a.outcome {
                AttemptOutcome::Success => format!("{}: SUCCESS", a.provider_id),
                AttemptOutcome::Skipped(skip) => format!("{}: SKIPPED ({:?})", a.provider_id, skip),
                AttemptOutcome::Empty => format!("{}: EMPTY", a.provider_id),
                AttemptOutcome::Error(err) => format!("{}: ERROR ({})", a.provider_id, err),
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// Get all skip reasons.
    pub fn skip_reasons(&self) -> Vec<(&ProviderId, &SkipReason)> {
        self.attempts
            .iter()
            .filter_map(|a| match &a.outcome {
                AttemptOutcome::Skipped(s) => Some((&a.provider_id, s)),
                _ => None,
            })
            .collect()
    }

    /// Get all errors.
    pub fn errors(&self) -> Vec<(&ProviderId, &str)> {
        self.attempts
            .iter()
            .filter_map(|a| match &a.outcome {
                AttemptOutcome::Error(e) => Some((&a.provider_id, e.as_str())),
                _ => None,
            })
            .collect()
    }
}
