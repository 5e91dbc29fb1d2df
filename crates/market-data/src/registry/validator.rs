//! Bar validation.
//!
//! Validates bars from providers before they reach callers:
//! - Finite, positive prices
//! - OHLC invariants (high >= low, open/close between high/low)

use log::warn;

use crate::models::Bar;

/// Validation severity levels.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationSeverity {
    /// Hard failure - drop the bar.
    Hard,
    /// Soft warning - keep the bar but log a warning.
    Soft,
}

/// A single problem found on a bar.
#[derive(Clone, Debug)]
pub struct ValidationIssue {
    pub severity: ValidationSeverity,
    pub message: String,
}

/// Bar validator configuration.
#[derive(Clone, Debug)]
pub struct ValidatorConfig {
    /// Whether to reject bars with zero or negative prices.
    pub reject_non_positive_prices: bool,
    /// Whether to reject bars where high < low.
    pub reject_invalid_ohlc: bool,
    /// Prices above this are logged as suspicious.
    pub max_price: Option<f64>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            reject_non_positive_prices: true,
            reject_invalid_ohlc: true,
            max_price: Some(1_000_000_000.0), // 1 billion as sanity check
        }
    }
}

/// Bar validator.
pub struct BarValidator {
    config: ValidatorConfig,
}

impl BarValidator {
    pub fn new() -> Self {
        Self {
            config: ValidatorConfig::default(),
        }
    }

    pub fn with_config(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Validate a bar.
    ///
    /// Returns `Err` with the joined hard-failure messages when the bar must
    /// be dropped. Soft issues are logged but do not cause rejection.
    pub fn validate(&self, bar: &Bar) -> Result<(), String> {
        let issues = self.issues(bar);

        let errors: Vec<&str> = issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Hard)
            .map(|i| i.message.as_str())
            .collect();

        if !errors.is_empty() {
            return Err(errors.join("; "));
        }

        for issue in issues.iter().filter(|i| i.severity == ValidationSeverity::Soft) {
            warn!("Bar validation warning at {}: {}", bar.timestamp, issue.message);
        }

        Ok(())
    }

    /// Validate all bars in a batch.
    ///
    /// Returns a tuple of (valid_bars, invalid_bars_with_reasons).
    pub fn validate_batch(&self, bars: Vec<Bar>) -> (Vec<Bar>, Vec<(Bar, String)>) {
        let mut valid = Vec::with_capacity(bars.len());
        let mut invalid = Vec::new();

        for bar in bars {
            match self.validate(&bar) {
                Ok(()) => valid.push(bar),
                Err(e) => invalid.push((bar, e)),
            }
        }

        (valid, invalid)
    }

    fn issues(&self, bar: &Bar) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let prices = [
            ("open", bar.open),
            ("high", bar.high),
            ("low", bar.low),
            ("close", bar.close),
        ];

        for (name, value) in prices {
            if !value.is_finite() {
                issues.push(ValidationIssue {
                    severity: ValidationSeverity::Hard,
                    message: format!("Non-finite {} price", name),
                });
            } else if self.config.reject_non_positive_prices && value <= 0.0 {
                issues.push(ValidationIssue {
                    severity: ValidationSeverity::Hard,
                    message: format!("Non-positive {} price: {}", name, value),
                });
            }
        }

        // High >= Low
        if self.config.reject_invalid_ohlc && bar.high < bar.low {
            issues.push(ValidationIssue {
                severity: ValidationSeverity::Hard,
                message: format!("High ({}) is less than Low ({})", bar.high, bar.low),
            });
        } else {
            for (name, value) in [("Open", bar.open), ("Close", bar.close)] {
                if value < bar.low || value > bar.high {
                    issues.push(ValidationIssue {
                        severity: ValidationSeverity::Soft,
                        message: format!(
                            "{} ({}) is outside High/Low range ({}-{})",
                            name, value, bar.low, bar.high
                        ),
                    });
                }
            }
        }

        if let Some(max_price) = self.config.max_price {
            if bar.high > max_price {
                issues.push(ValidationIssue {
                    severity: ValidationSeverity::Soft,
                    message: format!(
                        "High price ({}) exceeds max threshold ({})",
                        bar.high, max_price
                    ),
                });
            }
        }

        issues
    }
}

impl Default for BarValidator {
    fn default() -> Self {
        Self::new()
    }
}
