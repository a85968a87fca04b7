//! Tier 1: mechanical checks against the index and manifests.

use tracing::debug;

use docdrift_core::errors::VerificationError;
use docdrift_core::models::{CandidateSet, Claim, EntityType, ExtractedValue, RepoManifest};
use docdrift_core::traits::CodebaseIndex;

use super::url_probe::{UrlProbe, UrlStatus};
use super::version::{lowest_version, range_admits};
use super::TierVerdict;
use crate::mapper::strategies::normalize_path;

/// npm-family subcommands that are not package scripts.
const BUILTIN_SUBCOMMANDS: &[&str] = &[
    "install", "i", "ci", "add", "remove", "rm", "uninstall", "update", "up", "upgrade", "init",
    "create", "publish", "pack", "link", "unlink", "audit", "outdated", "exec", "dlx", "x",
    "login", "logout", "version", "config", "cache", "help", "why", "list", "ls", "info", "view",
];

const SCRIPT_RUNNERS: &[&str] = &["npm", "yarn", "pnpm", "bun"];

pub(crate) struct Tier1<'a> {
    pub index: &'a dyn CodebaseIndex,
    pub url_probe: Option<&'a dyn UrlProbe>,
}

impl Tier1<'_> {
    pub fn check(
        &self,
        claim: &Claim,
        candidates: &CandidateSet,
    ) -> Result<Option<TierVerdict>, VerificationError> {
        match &claim.extracted_value {
            ExtractedValue::PathReference { path } => self.path(claim, path, candidates),
            ExtractedValue::DependencyVersion { package, version } => {
                self.dependency(claim, package, version.as_deref())
            }
            ExtractedValue::Command { runner, script } => {
                self.command(claim, runner.as_deref(), script)
            }
            ExtractedValue::ApiRoute { method, path } => self.route(claim, method, path),
            ExtractedValue::Environment {
                runtime: Some(runtime),
                version: Some(version),
                ..
            } => self.engine(claim, runtime, version),
            ExtractedValue::UrlReference { url } => Ok(self.url(url)),
            _ => Ok(None),
        }
    }

    fn path(
        &self,
        claim: &Claim,
        raw: &str,
        candidates: &CandidateSet,
    ) -> Result<Option<TierVerdict>, VerificationError> {
        let path = normalize_path(raw);
        if path.is_empty() {
            return Ok(None);
        }
        let repo = claim.repo_id.as_str();
        if self.index.file_exists(repo, &path)? || self.index.directory_exists(repo, &path)? {
            return Ok(Some(
                TierVerdict::verified(1.0, format!("`{path}` exists")).with_evidence(vec![path]),
            ));
        }

        let matches = self.index.files_with_suffix(repo, &path)?;
        match matches.len() {
            0 => {
                let mut v = TierVerdict::drifted(0.95, format!("`{path}` does not exist in the repository"))
                    .with_mismatch(format!("referenced path `{path}` not found"));
                if let Some(top) = candidates.top().filter(|_| !candidates.is_ambiguous()) {
                    v = v.with_fix(format!("Update the reference to `{}`", top.code_file));
                }
                Ok(Some(v))
            }
            1 => Ok(Some(
                TierVerdict::verified(0.9, format!("`{path}` resolves to `{}`", matches[0]))
                    .with_evidence(matches),
            )),
            n => Ok(Some(
                TierVerdict::ambiguous(format!(
                    "`{path}` matches {n} files: {}",
                    matches.join(", ")
                ))
                .with_evidence(matches),
            )),
        }
    }

    fn dependency(
        &self,
        claim: &Claim,
        package: &str,
        documented: Option<&str>,
    ) -> Result<Option<TierVerdict>, VerificationError> {
        let manifests = self.index.manifests(&claim.repo_id)?;
        if manifests.is_empty() {
            return Ok(None);
        }
        let declared: Vec<(&RepoManifest, &str)> = manifests
            .iter()
            .filter_map(|m| m.dependency(package).map(|spec| (m, spec)))
            .collect();
        if declared.is_empty() {
            return Ok(Some(
                TierVerdict::drifted(0.9, format!("`{package}` is not declared in any manifest"))
                    .with_mismatch(format!("{package} is not a dependency"))
                    .with_evidence(manifests.iter().map(|m| m.file_path.clone()).collect()),
            ));
        }
        let Some(requirement) = documented.map(str::trim).filter(|r| !r.is_empty()) else {
            return Ok(Some(
                TierVerdict::verified(1.0, format!("`{package}` is declared"))
                    .with_evidence(declared.iter().map(|(m, _)| m.file_path.clone()).collect()),
            ));
        };

        let mut mismatch: Option<(&RepoManifest, &str)> = None;
        for &(manifest, spec) in &declared {
            let Some(lowest) = lowest_version(spec) else {
                continue;
            };
            match range_admits(requirement, &lowest) {
                Ok(true) => {
                    return Ok(Some(
                        TierVerdict::verified(
                            1.0,
                            format!("{} declares {package} {spec}, within {requirement}", manifest.file_path),
                        )
                        .with_evidence(vec![manifest.file_path.clone()]),
                    ))
                }
                Ok(false) => mismatch = mismatch.or(Some((manifest, spec))),
                Err(e) => {
                    debug!(error = %e, "documented version unparseable, escalating");
                    return Ok(None);
                }
            }
        }
        Ok(mismatch.map(|(manifest, spec)| {
            TierVerdict::drifted(
                0.95,
                format!("docs require {package} {requirement}, {} declares {spec}", manifest.file_path),
            )
            .with_mismatch(format!("{package}: documented {requirement}, actual {spec}"))
            .with_fix(format!("Update the documented version of {package} to {spec}"))
            .with_evidence(vec![manifest.file_path.clone()])
        }))
    }

    fn command(
        &self,
        claim: &Claim,
        runner: Option<&str>,
        script: &str,
    ) -> Result<Option<TierVerdict>, VerificationError> {
        let Some(runner) = runner.map(str::to_ascii_lowercase) else {
            return Ok(None);
        };
        if !SCRIPT_RUNNERS.contains(&runner.as_str()) {
            return Ok(None);
        }
        let script = script.trim();
        let script = script.strip_prefix("run ").unwrap_or(script).trim();
        let Some(name) = script.split_whitespace().next() else {
            return Ok(None);
        };
        if BUILTIN_SUBCOMMANDS.contains(&name) {
            return Ok(None);
        }
        let manifests = self.index.manifests(&claim.repo_id)?;
        if manifests.is_empty() {
            return Ok(None);
        }
        if let Some(m) = manifests.iter().find(|m| m.scripts.contains_key(name)) {
            return Ok(Some(
                TierVerdict::verified(1.0, format!("script `{name}` is defined in {}", m.file_path))
                    .with_evidence(vec![m.file_path.clone()]),
            ));
        }
        // `npm start` falls back to `node server.js` without a script.
        if name == "start" {
            return Ok(None);
        }
        let available: Vec<&str> = manifests
            .iter()
            .flat_map(|m| m.scripts.keys().map(String::as_str))
            .collect();
        let mut v = TierVerdict::drifted(0.9, format!("`{runner} {name}` has no matching script"))
            .with_mismatch(format!("script `{name}` is not defined"))
            .with_evidence(manifests.iter().map(|m| m.file_path.clone()).collect());
        if !available.is_empty() {
            v = v.with_fix(format!("Available scripts: {}", available.join(", ")));
        }
        Ok(Some(v))
    }

    fn route(
        &self,
        claim: &Claim,
        method: &str,
        path: &str,
    ) -> Result<Option<TierVerdict>, VerificationError> {
        let routes = self.index.entities_of_type(&claim.repo_id, EntityType::Route)?;
        if routes.is_empty() {
            return Ok(None);
        }
        let method = method.trim().to_ascii_uppercase();
        let wanted = normalize_route(path);
        let mut other_methods: Vec<String> = Vec::new();
        for route in &routes {
            let Some((m, p)) = route.name.trim().split_once(char::is_whitespace) else {
                continue;
            };
            if normalize_route(p) != wanted {
                continue;
            }
            let m = m.to_ascii_uppercase();
            if m == method || matches!(m.as_str(), "ALL" | "ANY" | "*") {
                return Ok(Some(
                    TierVerdict::verified(1.0, format!("{method} {path} is defined"))
                        .with_evidence(vec![route.file_path.clone()]),
                ));
            }
            other_methods.push(m);
        }
        if other_methods.is_empty() {
            Ok(Some(
                TierVerdict::drifted(0.8, format!("no route handles {method} {path}"))
                    .with_mismatch(format!("route {method} {path} not found")),
            ))
        } else {
            other_methods.sort();
            other_methods.dedup();
            Ok(Some(
                TierVerdict::drifted(
                    0.85,
                    format!("{path} handles {}, not {method}", other_methods.join("/")),
                )
                .with_mismatch(format!("method mismatch on {path}"))
                .with_fix(format!("Document {path} as {}", other_methods.join("/"))),
            ))
        }
    }

    fn engine(
        &self,
        claim: &Claim,
        runtime: &str,
        version: &str,
    ) -> Result<Option<TierVerdict>, VerificationError> {
        let key = match runtime.trim().to_ascii_lowercase().as_str() {
            "nodejs" | "node.js" => "node".to_string(),
            other => other.to_string(),
        };
        let manifests = self.index.manifests(&claim.repo_id)?;
        let Some((manifest, range)) = manifests.iter().find_map(|m| {
            m.engines
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(&key))
                .map(|(_, r)| (m, r.as_str()))
        }) else {
            return Ok(None);
        };
        let Some(documented) = lowest_version(version) else {
            return Ok(None);
        };
        match range_admits(range, &documented) {
            Ok(true) => Ok(Some(
                TierVerdict::verified(1.0, format!("{runtime} {version} satisfies engines.{key} {range}"))
                    .with_evidence(vec![manifest.file_path.clone()]),
            )),
            Ok(false) => Ok(Some(
                TierVerdict::drifted(0.9, format!("{runtime} {version} is outside engines.{key} {range}"))
                    .with_mismatch(format!("{runtime}: documented {version}, engines require {range}"))
                    .with_fix(format!("Document the supported {runtime} range as {range}"))
                    .with_evidence(vec![manifest.file_path.clone()]),
            )),
            Err(_) => Ok(None),
        }
    }

    fn url(&self, url: &str) -> Option<TierVerdict> {
        let probe = self.url_probe?;
        match probe.probe(url) {
            UrlStatus::Reachable(code) => Some(TierVerdict::verified(1.0, format!("{url} responded HTTP {code}"))),
            UrlStatus::Gone(code) => Some(
                TierVerdict::drifted(0.9, format!("{url} responded HTTP {code}"))
                    .with_mismatch(format!("link returns {code}")),
            ),
            UrlStatus::Inconclusive(reason) => {
                debug!(url, reason = %reason, "url probe inconclusive");
                None
            }
            UrlStatus::Skipped => None,
        }
    }
}

/// Route path with parameters collapsed to `{}` and no trailing slash or query.
pub(crate) fn normalize_route(path: &str) -> String {
    let path = path.trim();
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let segments: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            let param = s.starts_with(':')
                || (s.starts_with('{') && s.ends_with('}'))
                || (s.starts_with('<') && s.ends_with('>'))
                || (s.starts_with('[') && s.ends_with(']'));
            if param {
                "{}".to_string()
            } else {
                s.to_string()
            }
        })
        .collect();
    format!("/{}", segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_params_collapse() {
        assert_eq!(normalize_route("/users/:id/"), "/users/{}");
        assert_eq!(normalize_route("/users/{userId}"), "/users/{}");
        assert_eq!(normalize_route("users/<int:id>?x=1"), "/users/{}");
        assert_eq!(normalize_route("/"), "/");
    }
}
