//! Severity of drifted findings.

use docdrift_core::models::{ClaimType, Severity};

/// Base severity by how much damage stale docs of this type cause.
pub fn base_severity(claim_type: ClaimType) -> Severity {
    match claim_type {
        ClaimType::DependencyVersion | ClaimType::Command | ClaimType::ApiRoute => Severity::High,
        ClaimType::Convention | ClaimType::UrlReference => Severity::Low,
        ClaimType::PathReference
        | ClaimType::CodeExample
        | ClaimType::Behavior
        | ClaimType::Architecture
        | ClaimType::Config
        | ClaimType::Environment => Severity::Medium,
    }
}

/// Severity for a drifted verdict; lowered one level below 0.5 confidence.
pub fn assign(claim_type: ClaimType, confidence: f64) -> Severity {
    let base = base_severity(claim_type);
    if confidence < 0.5 {
        base.lowered()
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_defaults_high() {
        assert_eq!(assign(ClaimType::DependencyVersion, 0.9), Severity::High);
    }

    #[test]
    fn convention_defaults_low() {
        assert_eq!(assign(ClaimType::Convention, 0.9), Severity::Low);
    }

    #[test]
    fn low_confidence_lowers() {
        assert_eq!(assign(ClaimType::Command, 0.3), Severity::Medium);
        assert_eq!(assign(ClaimType::PathReference, 0.3), Severity::Low);
        assert_eq!(assign(ClaimType::UrlReference, 0.1), Severity::Low);
    }
}
