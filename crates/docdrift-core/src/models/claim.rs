//! Claims: typed factual assertions extracted from documentation.

use serde::{Deserialize, Serialize};

use super::string_enum;
use crate::errors::ExtractionError;

/// What kind of assertion a claim makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimType {
    PathReference,
    DependencyVersion,
    Command,
    ApiRoute,
    CodeExample,
    Behavior,
    Architecture,
    Config,
    Convention,
    Environment,
    UrlReference,
}

string_enum!(ClaimType {
    PathReference => "path_reference",
    DependencyVersion => "dependency_version",
    Command => "command",
    ApiRoute => "api_route",
    CodeExample => "code_example",
    Behavior => "behavior",
    Architecture => "architecture",
    Config => "config",
    Convention => "convention",
    Environment => "environment",
    UrlReference => "url_reference",
});

impl ClaimType {
    /// Testability assumed when the extractor does not say otherwise.
    pub fn default_testability(&self) -> Testability {
        match self {
            Self::Behavior | Self::Architecture | Self::Convention | Self::CodeExample => {
                Testability::Semantic
            }
            _ => Testability::Syntactic,
        }
    }

    /// Whether embedding similarity is a meaningful way to locate code for this type.
    pub fn is_semantic_searchable(&self) -> bool {
        matches!(
            self,
            Self::Behavior
                | Self::Architecture
                | Self::Convention
                | Self::Config
                | Self::CodeExample
                | Self::ApiRoute
                | Self::Environment
        )
    }
}

/// How a claim can be checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Testability {
    Syntactic,
    Semantic,
    Untestable,
}

string_enum!(Testability {
    Syntactic => "syntactic",
    Semantic => "semantic",
    Untestable => "untestable",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Regex,
    Heuristic,
    Llm,
}

string_enum!(ExtractionMethod {
    Regex => "regex",
    Heuristic => "heuristic",
    Llm => "llm",
});

/// Latest verification state of a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    #[default]
    Pending,
    Verified,
    Drifted,
    Uncertain,
}

string_enum!(VerificationStatus {
    Pending => "pending",
    Verified => "verified",
    Drifted => "drifted",
    Uncertain => "uncertain",
});

/// The typed payload of a claim, one variant per [`ClaimType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExtractedValue {
    PathReference {
        path: String,
    },
    DependencyVersion {
        package: String,
        #[serde(default)]
        version: Option<String>,
    },
    Command {
        #[serde(default)]
        runner: Option<String>,
        script: String,
    },
    ApiRoute {
        method: String,
        path: String,
    },
    CodeExample {
        #[serde(default)]
        language: Option<String>,
        #[serde(default)]
        symbols: Vec<String>,
        #[serde(default)]
        signature: Option<String>,
    },
    Behavior {
        description: String,
    },
    Architecture {
        description: String,
    },
    Config {
        key: String,
        #[serde(default)]
        value: Option<String>,
    },
    Convention {
        description: String,
    },
    Environment {
        #[serde(default)]
        runtime: Option<String>,
        #[serde(default)]
        version: Option<String>,
        #[serde(default)]
        variable: Option<String>,
    },
    UrlReference {
        url: String,
    },
}

impl ExtractedValue {
    pub fn claim_type(&self) -> ClaimType {
        match self {
            Self::PathReference { .. } => ClaimType::PathReference,
            Self::DependencyVersion { .. } => ClaimType::DependencyVersion,
            Self::Command { .. } => ClaimType::Command,
            Self::ApiRoute { .. } => ClaimType::ApiRoute,
            Self::CodeExample { .. } => ClaimType::CodeExample,
            Self::Behavior { .. } => ClaimType::Behavior,
            Self::Architecture { .. } => ClaimType::Architecture,
            Self::Config { .. } => ClaimType::Config,
            Self::Convention { .. } => ClaimType::Convention,
            Self::Environment { .. } => ClaimType::Environment,
            Self::UrlReference { .. } => ClaimType::UrlReference,
        }
    }
}

/// An extracted, typed factual assertion from documentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub id: String,
    pub repo_id: String,
    /// Documentation file the claim was extracted from.
    pub source_file: String,
    pub line_number: u32,
    pub claim_text: String,
    pub claim_type: ClaimType,
    pub testability: Testability,
    pub extracted_value: ExtractedValue,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub extraction_confidence: f64,
    pub extraction_method: ExtractionMethod,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub parent_claim_id: Option<String>,
    #[serde(default)]
    pub verification_status: VerificationStatus,
    #[serde(default)]
    pub last_verification_result_id: Option<String>,
}

impl Claim {
    /// A regex-extracted claim with the type's default testability.
    pub fn new(
        id: impl Into<String>,
        repo_id: impl Into<String>,
        source_file: impl Into<String>,
        line_number: u32,
        claim_text: impl Into<String>,
        extracted_value: ExtractedValue,
    ) -> Self {
        let claim_type = extracted_value.claim_type();
        Self {
            id: id.into(),
            repo_id: repo_id.into(),
            source_file: source_file.into(),
            line_number,
            claim_text: claim_text.into(),
            claim_type,
            testability: claim_type.default_testability(),
            extracted_value,
            keywords: Vec::new(),
            extraction_confidence: 1.0,
            extraction_method: ExtractionMethod::Regex,
            embedding: None,
            parent_claim_id: None,
            verification_status: VerificationStatus::Pending,
            last_verification_result_id: None,
        }
    }

    pub fn with_testability(mut self, testability: Testability) -> Self {
        self.testability = testability;
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_parent(mut self, parent_claim_id: impl Into<String>) -> Self {
        self.parent_claim_id = Some(parent_claim_id.into());
        self
    }

    pub fn is_testable(&self) -> bool {
        self.testability != Testability::Untestable
    }

    /// Reject malformed extractor output before it reaches the mapper.
    pub fn validate(&self) -> Result<(), ExtractionError> {
        if self.claim_text.trim().is_empty() {
            return Err(ExtractionError::EmptyText {
                claim_id: self.id.clone(),
            });
        }
        if !(0.0..=1.0).contains(&self.extraction_confidence) {
            return Err(ExtractionError::ConfidenceOutOfRange {
                claim_id: self.id.clone(),
                value: self.extraction_confidence,
            });
        }
        let value_type = self.extracted_value.claim_type();
        if value_type != self.claim_type {
            return Err(ExtractionError::ValueTypeMismatch {
                claim_id: self.id.clone(),
                claim_type: self.claim_type.to_string(),
                value_type: value_type.to_string(),
            });
        }
        if self.line_number == 0 {
            return Err(ExtractionError::InvalidLineNumber {
                claim_id: self.id.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_claim() -> Claim {
        Claim::new(
            "c1",
            "repo",
            "README.md",
            3,
            "See src/config/index.ts",
            ExtractedValue::PathReference {
                path: "src/config/index.ts".into(),
            },
        )
    }

    #[test]
    fn extracted_value_uses_snake_case_tag() {
        let json = serde_json::to_value(&path_claim().extracted_value).unwrap();
        assert_eq!(json["type"], "path_reference");
        assert_eq!(json["path"], "src/config/index.ts");
    }

    #[test]
    fn validate_rejects_mismatched_value() {
        let mut claim = path_claim();
        claim.claim_type = ClaimType::Command;
        assert!(matches!(
            claim.validate(),
            Err(ExtractionError::ValueTypeMismatch { .. })
        ));
    }

    #[test]
    fn validate_rejects_confidence_out_of_range() {
        let mut claim = path_claim();
        claim.extraction_confidence = 1.5;
        assert!(matches!(
            claim.validate(),
            Err(ExtractionError::ConfidenceOutOfRange { .. })
        ));
    }

    #[test]
    fn claim_type_string_roundtrip() {
        for t in ClaimType::ALL {
            assert_eq!(t.as_str().parse::<ClaimType>().unwrap(), *t);
        }
    }
}
