use std::borrow::Cow;

/// Provider identifier - mostly static constants such as "YAHOO" or "FINNHUB"
pub type ProviderId = Cow<'static, str>;

/// Normalize a user-supplied provider name ("finnhub", "Twelve_Data") to the
/// canonical upper-case id used as ledger and credential key.
pub fn normalize_provider_id(name: &str) -> String {
    name.trim().to_ascii_uppercase()
}
