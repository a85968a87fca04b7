//! Tier 2: documented shape against indexed code shape.
//!
//! Only produces `drifted`. A small difference inside the configured
//! tolerance is passed on as a concern that stops Tier 3 from verifying.

use docdrift_core::errors::VerificationError;
use docdrift_core::models::{CandidateSet, Claim, CodeEntity, EntityType, ExtractedValue};
use docdrift_core::traits::CodebaseIndex;

use super::TierVerdict;

#[derive(Debug, Default)]
pub(crate) struct Structural {
    pub verdict: Option<TierVerdict>,
    pub concern: Option<String>,
}

impl Structural {
    fn drifted(v: TierVerdict) -> Self {
        Self {
            verdict: Some(v),
            concern: None,
        }
    }

    fn concern(message: String) -> Self {
        Self {
            verdict: None,
            concern: Some(message),
        }
    }
}

pub(crate) struct Tier2<'a> {
    pub index: &'a dyn CodebaseIndex,
    pub tolerance: f64,
}

impl Tier2<'_> {
    pub fn check(
        &self,
        claim: &Claim,
        candidates: &CandidateSet,
    ) -> Result<Structural, VerificationError> {
        match &claim.extracted_value {
            ExtractedValue::CodeExample {
                symbols, signature, ..
            } => self.code_example(claim, symbols, signature.as_deref(), candidates),
            ExtractedValue::Config { key, value } => self.config(claim, key, value.as_deref()),
            _ => Ok(Structural::default()),
        }
    }

    fn code_example(
        &self,
        claim: &Claim,
        symbols: &[String],
        signature: Option<&str>,
        candidates: &CandidateSet,
    ) -> Result<Structural, VerificationError> {
        let mut missing = Vec::new();
        for symbol in symbols.iter().filter(|s| !s.trim().is_empty()) {
            if self.index.find_entities(&claim.repo_id, symbol, false)?.is_empty() {
                missing.push(symbol.as_str());
            }
        }
        if !missing.is_empty() {
            return Ok(Structural::drifted(
                TierVerdict::drifted(
                    0.75,
                    format!("example references symbols missing from the code: {}", missing.join(", ")),
                )
                .with_mismatch(format!("unknown symbols: {}", missing.join(", "))),
            ));
        }

        let Some(documented) = signature.and_then(Signature::parse) else {
            return Ok(Structural::default());
        };
        let entities = self.index.find_entities(&claim.repo_id, &documented.name, false)?;
        let Some(entity) = pick_entity(&entities, candidates) else {
            return Ok(Structural::default());
        };
        let Some(actual) = entity.signature.as_deref().and_then(Signature::parse) else {
            return Ok(Structural::default());
        };

        let diff = documented.diff(&actual);
        if diff == 0.0 {
            return Ok(Structural::default());
        }
        let shown = entity.signature.as_deref().unwrap_or_default();
        if diff > self.tolerance {
            Ok(Structural::drifted(
                TierVerdict::drifted(
                    0.85,
                    format!("documented signature of `{}` differs from the code", documented.name),
                )
                .with_mismatch(format!("documented `{}`, actual `{shown}`", signature.unwrap_or_default()))
                .with_fix(format!("Update the example to `{shown}`"))
                .with_evidence(vec![entity.file_path.clone()]),
            ))
        } else {
            Ok(Structural::concern(format!(
                "signature of `{}` differs slightly ({:.0}% of parameters)",
                documented.name,
                diff * 100.0
            )))
        }
    }

    fn config(
        &self,
        claim: &Claim,
        key: &str,
        value: Option<&str>,
    ) -> Result<Structural, VerificationError> {
        let key = key.trim();
        if key.is_empty() {
            return Ok(Structural::default());
        }
        let mut entries: Vec<CodeEntity> = self
            .index
            .find_entities(&claim.repo_id, key, false)?
            .into_iter()
            .filter(|e| e.entity_type == EntityType::Config)
            .collect();
        if entries.is_empty() {
            if let Some((_, leaf)) = key.rsplit_once('.') {
                entries = self
                    .index
                    .find_entities(&claim.repo_id, leaf, false)?
                    .into_iter()
                    .filter(|e| e.entity_type == EntityType::Config)
                    .collect();
            }
        }
        if entries.is_empty() {
            if self
                .index
                .entities_of_type(&claim.repo_id, EntityType::Config)?
                .is_empty()
            {
                return Ok(Structural::default());
            }
            return Ok(Structural::drifted(
                TierVerdict::drifted(0.7, format!("config key `{key}` is not defined"))
                    .with_mismatch(format!("unknown config key `{key}`")),
            ));
        }

        let Some(value) = value.map(squash).filter(|v| !v.is_empty()) else {
            return Ok(Structural::default());
        };
        let matches = entries.iter().any(|e| {
            e.raw_code
                .as_deref()
                .or(e.signature.as_deref())
                .map(|code| squash(code).contains(&value))
                .unwrap_or(false)
        });
        if matches {
            return Ok(Structural::default());
        }
        Ok(Structural::drifted(
            TierVerdict::drifted(0.75, format!("config key `{key}` has a different value"))
                .with_mismatch(format!("`{key}` is not set to the documented value"))
                .with_evidence(entries.iter().map(|e| e.file_path.clone()).collect()),
        ))
    }
}

/// Prefer an entity the mapper already ranked for this claim.
fn pick_entity<'e>(entities: &'e [CodeEntity], candidates: &CandidateSet) -> Option<&'e CodeEntity> {
    candidates
        .mappings
        .iter()
        .find_map(|m| {
            entities
                .iter()
                .find(|e| Some(e.id.as_str()) == m.code_entity_id.as_deref())
        })
        .or_else(|| {
            let files = candidates.files();
            entities.iter().find(|e| files.contains(&e.file_path.as_str()))
        })
        .or_else(|| entities.first())
}

/// Lowercase, whitespace and quotes removed.
fn squash(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace() && *c != '"' && *c != '\'')
        .flat_map(char::to_lowercase)
        .collect()
}

/// A call signature reduced to comparable parts, whitespace removed.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Signature {
    pub name: String,
    pub params: Vec<String>,
    pub ret: Option<String>,
}

const RECEIVERS: &[&str] = &["self", "&self", "&mutself", "mutself", "cls", "this"];

impl Signature {
    pub fn parse(s: &str) -> Option<Self> {
        let open = s.find('(')?;
        let name = s[..open]
            .rsplit(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
            .find(|t| !t.is_empty())?
            .to_string();

        let mut depth = 0usize;
        let mut close = None;
        let mut params = Vec::new();
        let mut current = String::new();
        for (i, c) in s[open..].char_indices() {
            match c {
                '(' | '<' | '[' | '{' => {
                    depth += 1;
                    if depth > 1 {
                        current.push(c);
                    }
                }
                ')' | '>' | ']' | '}' if depth > 0 => {
                    // `->` inside parameters is not a closing bracket.
                    if c == '>' && current.ends_with('-') {
                        current.push(c);
                        continue;
                    }
                    depth -= 1;
                    if depth == 0 {
                        close = Some(open + i);
                        break;
                    }
                    current.push(c);
                }
                ',' if depth == 1 => params.push(std::mem::take(&mut current)),
                c if c.is_whitespace() => {}
                c => current.push(c),
            }
        }
        let close = close?;
        params.push(current);
        params.retain(|p| !p.is_empty() && !RECEIVERS.contains(&p.as_str()));

        let tail = s[close + 1..].trim();
        let tail = tail.trim_end_matches(['{', ';', ':']).trim();
        let tail = tail
            .strip_prefix("->")
            .or_else(|| tail.strip_prefix(':'))
            .or_else(|| tail.strip_prefix("=>"))
            .unwrap_or(tail);
        let ret: String = tail.chars().filter(|c| !c.is_whitespace()).collect();

        Some(Self {
            name,
            params,
            ret: (!ret.is_empty()).then_some(ret),
        })
    }

    /// Fraction of parameter positions (plus return type, when both sides
    /// state one) that differ. A documented parameter without a type
    /// matches on name alone.
    pub fn diff(&self, actual: &Signature) -> f64 {
        let n = self.params.len().max(actual.params.len());
        let mut units = n;
        let mut differing = self.params.len().abs_diff(actual.params.len());
        for (doc, code) in self.params.iter().zip(&actual.params) {
            if !param_matches(doc, code) {
                differing += 1;
            }
        }
        if let (Some(a), Some(b)) = (&self.ret, &actual.ret) {
            units += 1;
            if a != b {
                differing += 1;
            }
        }
        if units == 0 {
            0.0
        } else {
            differing as f64 / units as f64
        }
    }
}

fn param_name(p: &str) -> &str {
    let p = p.split([':', '=']).next().unwrap_or(p);
    let p = p.strip_prefix("mut").filter(|rest| !rest.is_empty()).unwrap_or(p);
    p.trim_end_matches('?')
}

fn param_matches(doc: &str, code: &str) -> bool {
    if doc == code {
        return true;
    }
    let doc_typed = doc.contains(':');
    if !doc_typed {
        return param_name(doc) == param_name(code);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rust_signature() {
        let s = Signature::parse("pub fn load(&self, path: &Path, opts: Options) -> Result<Config>").unwrap();
        assert_eq!(s.name, "load");
        assert_eq!(s.params, vec!["path:&Path", "opts:Options"]);
        assert_eq!(s.ret.as_deref(), Some("Result<Config>"));
    }

    #[test]
    fn parses_typescript_signature() {
        let s = Signature::parse("export function fetchUser(id: string, opts?: Opts): Promise<User> {").unwrap();
        assert_eq!(s.name, "fetchUser");
        assert_eq!(s.params.len(), 2);
        assert_eq!(s.ret.as_deref(), Some("Promise<User>"));
    }

    #[test]
    fn whitespace_is_ignored() {
        let a = Signature::parse("connect( host : &str , port:u16 )").unwrap();
        let b = Signature::parse("fn connect(host: &str, port: u16)").unwrap();
        assert_eq!(a.diff(&b), 0.0);
    }

    #[test]
    fn untyped_docs_match_on_names() {
        let doc = Signature::parse("login(user, password)").unwrap();
        let code = Signature::parse("def login(user: str, password: str = None) -> bool:").unwrap();
        assert_eq!(doc.diff(&code), 0.0);
    }

    #[test]
    fn missing_parameter_counts() {
        let doc = Signature::parse("send(to, body)").unwrap();
        let code = Signature::parse("fn send(to: &str, body: &str, retries: u32)").unwrap();
        let d = doc.diff(&code);
        assert!((d - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn generic_parameters_do_not_split() {
        let s = Signature::parse("fn merge(a: HashMap<K, V>, b: HashMap<K, V>)").unwrap();
        assert_eq!(s.params.len(), 2);
    }
}
