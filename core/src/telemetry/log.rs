use crate::model::Candidate;
use log::{debug, info, warn};

/// Logger that tags every line with the candidate being processed.
pub struct LogManager {
    scope: String,
}

impl LogManager {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
        }
    }

    pub fn for_candidate(candidate: &Candidate) -> Self {
        Self::new(format!("t0={:.6}s dm={:.3}", candidate.t0, candidate.dm))
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn record(&self, message: &str) {
        info!("[{}] {}", self.scope, message);
    }

    pub fn detail(&self, message: &str) {
        debug!("[{}] {}", self.scope, message);
    }

    pub fn warn(&self, message: &str) {
        warn!("[{}] {}", self.scope, message);
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new("candies")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_scope_carries_identity() {
        let logger = LogManager::for_candidate(&Candidate::new(1.5, 42.0, 9.0, 2));
        assert_eq!(logger.scope(), "t0=1.500000s dm=42.000");
    }
}
