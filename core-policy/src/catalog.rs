// =====================================================================================
// File: core-policy/src/catalog.rs
// Description: Policy catalog loading, compilation, and hot reload
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use crate::model::{Policy, RawPolicyFile};
use crate::{PolicyError, PolicyResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// File extensions recognized as policy files
const POLICY_EXTENSIONS: [&str; 2] = ["yml", "yaml"];

/// An immutable, compiled view of the policy set.
///
/// Snapshots are shared behind `Arc` and never mutated after publication;
/// readers that hold one keep evaluating against it even while a reload
/// installs a successor.
pub struct PolicyCatalog {
    policies: Vec<Policy>,
    patterns: HashMap<String, Regex>,
}

impl PolicyCatalog {
    /// Catalog with no policies; every evaluation is a no-match
    pub fn empty() -> Self {
        Self {
            policies: Vec::new(),
            patterns: HashMap::new(),
        }
    }

    /// Compile a validated policy set into a catalog.
    ///
    /// Policies are ordered by (priority ascending, id ascending); every
    /// regex condition is compiled once and cached under its
    /// `(policy_id, rule_id, condition_index)` key.
    pub fn compile(mut policies: Vec<Policy>) -> PolicyResult<Self> {
        let mut seen = std::collections::HashSet::new();
        for policy in &policies {
            if !seen.insert(policy.id.clone()) {
                return Err(PolicyError::validation_error(
                    "policy.id".to_string(),
                    format!("duplicate policy id '{}'", policy.id),
                ));
            }
        }

        policies.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut patterns = HashMap::new();
        for policy in &policies {
            for rule in &policy.rules {
                for (index, condition) in rule.conditions.iter().enumerate() {
                    if condition.operator != crate::ConditionOperator::Regex {
                        continue;
                    }
                    let pattern = condition
                        .value
                        .as_ref()
                        .and_then(|v| v.as_str())
                        .ok_or_else(|| {
                            PolicyError::pattern_error(
                                pattern_key(&policy.id, &rule.id, index),
                                "regex value must be a string".to_string(),
                            )
                        })?;
                    let compiled = Regex::new(pattern).map_err(|e| {
                        PolicyError::pattern_error(
                            pattern_key(&policy.id, &rule.id, index),
                            e.to_string(),
                        )
                    })?;
                    patterns.insert(pattern_key(&policy.id, &rule.id, index), compiled);
                }
            }
        }

        Ok(Self { policies, patterns })
    }

    /// Policies in evaluation order (disabled policies included)
    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn get(&self, policy_id: &str) -> Option<&Policy> {
        self.policies.iter().find(|p| p.id == policy_id)
    }

    /// Look up a compiled regex condition
    pub fn pattern(&self, policy_id: &str, rule_id: &str, condition_index: usize) -> Option<&Regex> {
        self.patterns
            .get(&pattern_key(policy_id, rule_id, condition_index))
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }
}

fn pattern_key(policy_id: &str, rule_id: &str, condition_index: usize) -> String {
    format!("{}:{}:{}", policy_id, rule_id, condition_index)
}

/// A policy file that failed to load, with the reason it was skipped
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

/// Outcome of one catalog load
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: Vec<SkippedFile>,
}

/// Owns the live catalog snapshot and its reload lifecycle.
///
/// Loads build a complete new catalog off-path and then swap the shared
/// pointer; in-flight evaluations keep the snapshot they started with.
pub struct CatalogService {
    directory: PathBuf,
    current: RwLock<Arc<PolicyCatalog>>,
    last_report: RwLock<LoadReport>,
    fingerprint: RwLock<Vec<(PathBuf, SystemTime)>>,
}

impl CatalogService {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            current: RwLock::new(Arc::new(PolicyCatalog::empty())),
            last_report: RwLock::new(LoadReport::default()),
            fingerprint: RwLock::new(Vec::new()),
        }
    }

    /// The current immutable snapshot
    pub async fn snapshot(&self) -> Arc<PolicyCatalog> {
        self.current.read().await.clone()
    }

    /// Result of the most recent load, for the admin surface
    pub async fn last_report(&self) -> LoadReport {
        self.last_report.read().await.clone()
    }

    /// Install a policy set directly, bypassing the filesystem. Used by the
    /// admin surface and tests.
    pub async fn install(&self, policies: Vec<Policy>) -> PolicyResult<()> {
        let catalog = Arc::new(PolicyCatalog::compile(policies)?);
        *self.current.write().await = catalog;
        Ok(())
    }

    /// Scan the policy directory, validate and compile every recognized
    /// file, and atomically publish the result.
    ///
    /// Invalid files are skipped and reported; they never abort the load.
    /// When the directory itself is unreadable the previous snapshot stays
    /// in place and the error is returned.
    pub async fn load_policies(&self) -> PolicyResult<LoadReport> {
        let files = self.policy_files()?;
        let mut policies = Vec::new();
        let mut report = LoadReport::default();

        for path in &files {
            match load_policy_file(path) {
                Ok(policy) => {
                    debug!(path = %path.display(), policy_id = %policy.id, "Policy file loaded");
                    policies.push(policy);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping invalid policy file");
                    report.skipped.push(SkippedFile {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let catalog = match PolicyCatalog::compile(policies) {
            Ok(catalog) => catalog,
            Err(e) => {
                // Cross-file problem (duplicate ids). Keep the old snapshot.
                error!(error = %e, "Catalog compilation failed, keeping previous snapshot");
                return Err(e);
            }
        };

        report.loaded = catalog.len();
        info!(
            loaded = report.loaded,
            skipped = report.skipped.len(),
            directory = %self.directory.display(),
            "Policy catalog published"
        );

        *self.current.write().await = Arc::new(catalog);
        *self.last_report.write().await = report.clone();
        *self.fingerprint.write().await = self.directory_fingerprint();

        Ok(report)
    }

    /// Explicit hot-reload trigger
    pub async fn reload(&self) -> PolicyResult<LoadReport> {
        self.load_policies().await
    }

    /// Spawn a polling watcher that reloads the catalog when the policy
    /// directory changes. Returns the task handle so callers can stop it at
    /// shutdown.
    pub fn spawn_watcher(
        self: &Arc<Self>,
        interval: std::time::Duration,
    ) -> tokio::task::JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let observed = service.directory_fingerprint();
                let changed = { *service.fingerprint.read().await != observed };
                if changed {
                    info!(directory = %service.directory.display(), "Policy directory changed, reloading");
                    if let Err(e) = service.reload().await {
                        error!(error = %e, "Policy reload failed");
                    }
                }
            }
        })
    }

    fn policy_files(&self) -> PolicyResult<Vec<PathBuf>> {
        if !self.directory.exists() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&self.directory).map_err(|e| {
            PolicyError::io_error(self.directory.display().to_string(), e.to_string())
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| POLICY_EXTENSIONS.contains(&ext))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();
        Ok(files)
    }

    fn directory_fingerprint(&self) -> Vec<(PathBuf, SystemTime)> {
        let mut entries: Vec<(PathBuf, SystemTime)> = self
            .policy_files()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|path| {
                let modified = std::fs::metadata(&path).and_then(|m| m.modified()).ok()?;
                Some((path, modified))
            })
            .collect();
        entries.sort();
        entries
    }
}

fn load_policy_file(path: &Path) -> PolicyResult<Policy> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| PolicyError::io_error(path.display().to_string(), e.to_string()))?;
    let raw: RawPolicyFile = serde_yaml::from_str(&contents)
        .map_err(|e| PolicyError::parse_error(path.display().to_string(), e.to_string()))?;
    raw.validate()
}
