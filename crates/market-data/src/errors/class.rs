/// Classification of provider failures.
///
/// Every class means "skip this provider for this call"; the class only
/// decides how the skip is logged and reported in diagnostics.
///
/// | Class | Typical cause | Logged at |
/// |-------|---------------|-----------|
/// | `Configuration` | missing key, unsupported interval | debug |
/// | `Transient` | timeout, 5xx, malformed payload, no data | warn |
/// | `RateLimit` | provider 429 or API quota note | warn |
/// | `Storage` | credential persistence failure | error |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    /// The provider cannot serve this request as configured. Not worth a warning.
    Configuration,

    /// The provider failed this time; it may succeed on the next call.
    Transient,

    /// The provider refused because its quota is exhausted.
    RateLimit,

    /// Credential storage failed. Never produced by provider adapters.
    Storage,
}
