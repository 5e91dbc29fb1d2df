use serde::{Deserialize, Serialize};

/// Snapshot of one provider's configuration and remaining budget.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    /// Whether an API key is stored for this provider
    pub has_key: bool,
    /// Whether the provider refuses to work without one
    pub requires_key: bool,
    /// Calls still available in the trailing 60-second window
    pub remaining_calls: u32,
    /// Configured calls per minute
    pub limit: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_camel_case() {
        let status = ProviderStatus {
            has_key: true,
            requires_key: true,
            remaining_calls: 7,
            limit: 8,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["hasKey"], true);
        assert_eq!(json["requiresKey"], true);
        assert_eq!(json["remainingCalls"], 7);
        assert_eq!(json["limit"], 8);
    }
}
