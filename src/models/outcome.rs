use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Summary of one completed logical request, fed to the metrics recorder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestOutcome {
    pub status_code: u16,
    pub method: String,
    pub proxy_address: String,
    /// Attempts made, including the one that produced the status
    pub attempts: u32,
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
    pub timestamp: DateTime<Utc>,
}

impl RequestOutcome {
    pub fn new(
        status_code: u16,
        method: impl Into<String>,
        proxy_address: impl Into<String>,
    ) -> Self {
        Self {
            status_code,
            method: method.into(),
            proxy_address: proxy_address.into(),
            attempts: 1,
            elapsed: Duration::ZERO,
            timestamp: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status_code)
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_success_range() {
        assert!(RequestOutcome::new(200, "GET", "1.2.3.4").is_success());
        assert!(RequestOutcome::new(302, "GET", "1.2.3.4").is_success());
        assert!(!RequestOutcome::new(404, "GET", "1.2.3.4").is_success());
        assert!(!RequestOutcome::new(503, "GET", "1.2.3.4").is_success());
    }

    #[test]
    fn test_outcome_serializes_elapsed_as_millis() {
        let mut outcome = RequestOutcome::new(200, "GET", "1.2.3.4");
        outcome.elapsed = Duration::from_millis(1500);
        outcome.attempts = 2;

        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["elapsed"], 1500);
        assert_eq!(value["attempts"], 2);
        assert_eq!(value["proxy_address"], "1.2.3.4");
    }
}
