//! Rule and global configuration model, plus the rule file load/save layer.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::matcher::compile_patterns;
use crate::error::{ConfigError, Result};

/// Disposition applied to a matched entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Reversible move into the quarantine root.
    #[default]
    Quarantine,
    /// Hand the entry to the OS trash.
    Recycle,
    /// Permanent removal.
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Quarantine => "quarantine",
            Action::Recycle => "recycle",
            Action::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// A named scan/action rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique key of the rule
    pub name: String,
    /// Root directory the rule walks
    pub path: PathBuf,
    /// Glob patterns matched against paths relative to `path`
    #[serde(default = "default_patterns")]
    pub patterns: Vec<String>,
    /// Minimum age in days (by modification time)
    #[serde(default)]
    pub min_age_days: u64,
    /// Disposition for matched entries
    #[serde(default)]
    pub action: Action,
    /// Remove directories left empty under the root after cleaning
    #[serde(default = "default_true")]
    pub remove_empty_dirs: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_patterns() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_true() -> bool {
    true
}

impl Rule {
    /// Create a rule with default patterns, age and action.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            patterns: default_patterns(),
            min_age_days: 0,
            action: Action::default(),
            remove_empty_dirs: true,
            enabled: true,
        }
    }

    pub fn with_patterns<S: Into<String>>(mut self, patterns: impl IntoIterator<Item = S>) -> Self {
        self.patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_min_age_days(mut self, days: u64) -> Self {
        self.min_age_days = days;
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }

    pub fn with_remove_empty_dirs(mut self, enabled: bool) -> Self {
        self.remove_empty_dirs = enabled;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Root path with a leading `~` expanded to the home directory.
    pub fn root(&self) -> PathBuf {
        expand_home(&self.path)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        if self.path.as_os_str().is_empty() {
            return Err("path must not be empty".to_string());
        }
        if self.patterns.is_empty() {
            return Err("at least one pattern is required".to_string());
        }
        compile_patterns(&self.patterns).map_err(|e| format!("bad pattern: {}", e))?;
        Ok(())
    }
}

/// Engine-wide switches and safety caps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Simulate only; never touch the filesystem
    pub dry_run: bool,
    /// Allow quarantine moves
    pub quarantine_enabled: bool,
    /// Traverse and match symlinked entries
    pub follow_symlinks: bool,
    /// Maximum dispositions per rule and run
    pub max_delete_per_rule: usize,
    /// Maximum dispositions per run
    pub max_total_delete: usize,
    /// Log files older than this are removed at startup
    pub log_age_off_days: u32,
    /// Force every disposition to Recycle
    pub hard_recycle_only: bool,
    /// Staging directory for quarantined entries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quarantine_root: Option<PathBuf>,
    /// Directory for the log file (none = stderr only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
    /// Upper bound on outcomes kept in a report
    pub max_report_outcomes: usize,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            dry_run: true,
            quarantine_enabled: true,
            follow_symlinks: false,
            max_delete_per_rule: 50_000,
            max_total_delete: 200_000,
            log_age_off_days: 30,
            hard_recycle_only: false,
            quarantine_root: None,
            log_dir: None,
            max_report_outcomes: 10_000,
        }
    }
}

impl GlobalConfig {
    /// Effective quarantine root.
    pub fn quarantine_root(&self) -> PathBuf {
        match &self.quarantine_root {
            Some(root) => expand_home(root),
            None => dirs::home_dir()
                .map(|h| h.join(".reclaim_quarantine"))
                .unwrap_or_else(|| std::env::temp_dir().join("reclaim_quarantine")),
        }
    }

    fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.max_delete_per_rule == 0 {
            return Err(ConfigError::Invalid(
                "max_delete_per_rule must be positive".into(),
            ));
        }
        if self.max_total_delete == 0 {
            return Err(ConfigError::Invalid(
                "max_total_delete must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// A rule that failed validation and was dropped from the set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleIssue {
    pub rule: String,
    pub reason: String,
}

impl fmt::Display for RuleIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule '{}': {}", self.rule, self.reason)
    }
}

/// The persisted document: global config plus ordered rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub config: GlobalConfig,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// Result of loading a rule file: the valid rules and what was rejected.
#[derive(Debug, Clone)]
pub struct LoadedRules {
    pub rule_set: RuleSet,
    pub issues: Vec<RuleIssue>,
}

#[derive(Deserialize)]
struct RawDocument {
    #[serde(default)]
    config: Option<serde_json::Value>,
    #[serde(default)]
    rules: Vec<serde_json::Value>,
}

impl RuleSet {
    pub fn new(config: GlobalConfig, rules: Vec<Rule>) -> Self {
        Self { config, rules }
    }

    /// Built-in rule set used when no rule file exists.
    pub fn with_defaults() -> Self {
        Self::new(GlobalConfig::default(), default_rules())
    }

    /// Default rule file location.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("reclaim")
            .join("rules.json")
    }

    /// Load from `path` (or the default location). A missing file yields the
    /// built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<LoadedRules> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);

        if !path.exists() {
            tracing::debug!(path = %path.display(), "Rule file not found, using defaults");
            return Ok(LoadedRules {
                rule_set: Self::with_defaults(),
                issues: Vec::new(),
            });
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::Read {
            path: path.clone(),
            source: e,
        })?;

        if is_toml(&path) {
            Self::from_toml_str(&content, &path)
        } else {
            Self::from_json_str(&content, &path)
        }
    }

    pub fn from_json_str(content: &str, origin: &Path) -> Result<LoadedRules> {
        let doc: RawDocument =
            serde_json::from_str(content).map_err(|e| ConfigError::ParseJson {
                path: origin.to_path_buf(),
                source: e,
            })?;
        Self::from_document(doc)
    }

    pub fn from_toml_str(content: &str, origin: &Path) -> Result<LoadedRules> {
        let table: toml::Table = toml::from_str(content).map_err(|e| ConfigError::ParseToml {
            path: origin.to_path_buf(),
            source: e,
        })?;
        let value = serde_json::to_value(table)
            .map_err(|e| ConfigError::Invalid(format!("unrepresentable TOML: {}", e)))?;
        let doc: RawDocument = serde_json::from_value(value)
            .map_err(|e| ConfigError::Invalid(format!("bad document shape: {}", e)))?;
        Self::from_document(doc)
    }

    fn from_document(doc: RawDocument) -> Result<LoadedRules> {
        let config = match doc.config {
            Some(value) => serde_json::from_value::<GlobalConfig>(value)
                .map_err(|e| ConfigError::Invalid(format!("config section: {}", e)))?,
            None => GlobalConfig::default(),
        };
        config.validate()?;

        let mut rules = Vec::new();
        let mut issues = Vec::new();
        let mut seen = HashSet::new();

        for (idx, value) in doc.rules.into_iter().enumerate() {
            let label = value
                .get("name")
                .and_then(|n| n.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("rules[{}]", idx));

            let rule: Rule = match serde_json::from_value(value) {
                Ok(rule) => rule,
                Err(e) => {
                    issues.push(RuleIssue {
                        rule: label,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            if let Err(reason) = rule.validate() {
                issues.push(RuleIssue { rule: label, reason });
                continue;
            }

            if !seen.insert(rule.name.clone()) {
                issues.push(RuleIssue {
                    rule: label,
                    reason: "duplicate rule name".to_string(),
                });
                continue;
            }

            rules.push(rule);
        }

        for issue in &issues {
            tracing::warn!("Skipping {}", issue);
        }

        Ok(LoadedRules {
            rule_set: Self::new(config, rules),
            issues,
        })
    }

    /// Write the rule set, choosing the format from the file extension.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = if is_toml(path) {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            serde_json::to_string_pretty(self)
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(())
    }

    /// Look up a rule by name.
    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }
}

/// Rules shipped with the tool: stale temp files and Python bytecode caches.
pub fn default_rules() -> Vec<Rule> {
    let mut rules = vec![Rule::new("System TEMP", std::env::temp_dir()).with_min_age_days(1)];
    if let Some(home) = dirs::home_dir() {
        rules.push(
            Rule::new("Python __pycache__", home).with_patterns(["**/__pycache__/*"]),
        );
    }
    rules
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false)
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    let mut components = path.components();
    match components.next() {
        Some(std::path::Component::Normal(first)) if first == "~" => match dirs::home_dir() {
            Some(home) => home.join(components.as_path()),
            None => path.to_path_buf(),
        },
        _ => path.to_path_buf(),
    }
}
