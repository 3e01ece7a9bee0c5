use reclaim::config::{Action, RuleSet};
use std::io::Write;
use tempfile::{Builder, NamedTempFile, TempDir};

fn write_temp(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn parse_complete_json_rule_file() {
    let content = r#"{
  "config": {
    "dry_run": false,
    "quarantine_enabled": true,
    "follow_symlinks": false,
    "max_delete_per_rule": 10,
    "max_total_delete": 20,
    "log_age_off_days": 7,
    "hard_recycle_only": false,
    "quarantine_root": "/srv/quarantine"
  },
  "rules": [
    {
      "name": "Downloads",
      "path": "/home/someone/Downloads",
      "patterns": ["*.iso", "**/*.part"],
      "min_age_days": 30,
      "action": "recycle",
      "remove_empty_dirs": false,
      "enabled": true
    },
    { "name": "Scratch", "path": "/scratch" }
  ]
}"#;
    let file = write_temp(".json", content);

    let loaded = RuleSet::load(Some(file.path())).unwrap();

    assert!(loaded.issues.is_empty());
    let set = loaded.rule_set;
    assert!(!set.config.dry_run);
    assert_eq!(set.config.max_delete_per_rule, 10);
    assert_eq!(set.config.log_age_off_days, 7);
    assert_eq!(
        set.config.quarantine_root(),
        std::path::PathBuf::from("/srv/quarantine")
    );
    assert_eq!(set.rules.len(), 2);
    assert_eq!(set.rules[0].action, Action::Recycle);
    assert!(!set.rules[0].remove_empty_dirs);

    let scratch = set.get("Scratch").unwrap();
    assert_eq!(scratch.patterns, vec!["*".to_string()]);
    assert_eq!(scratch.action, Action::Quarantine);
    assert!(scratch.enabled);
}

#[test]
fn parse_toml_rule_file() {
    let content = r#"
[config]
dry_run = true
max_total_delete = 5

[[rules]]
name = "logs"
path = "/var/tmp/app"
patterns = ["*.log"]
min_age_days = 3
action = "delete"
"#;
    let file = write_temp(".toml", content);

    let loaded = RuleSet::load(Some(file.path())).unwrap();

    assert!(loaded.issues.is_empty());
    assert_eq!(loaded.rule_set.config.max_total_delete, 5);
    assert_eq!(loaded.rule_set.rules[0].action, Action::Delete);
    assert_eq!(loaded.rule_set.rules[0].min_age_days, 3);
}

#[test]
fn bad_rules_are_dropped_not_fatal() {
    let content = r#"{
  "rules": [
    { "name": "good", "path": "/tmp" },
    { "name": "wrong action", "path": "/tmp", "action": "shred" },
    { "name": "no patterns", "path": "/tmp", "patterns": [] },
    { "path": "/tmp" },
    { "name": "good", "path": "/var/tmp" },
    { "name": "bad glob", "path": "/tmp", "patterns": ["a[b"] }
  ]
}"#;
    let file = write_temp(".json", content);

    let loaded = RuleSet::load(Some(file.path())).unwrap();

    assert_eq!(loaded.rule_set.rules.len(), 1);
    assert_eq!(loaded.rule_set.rules[0].path, std::path::PathBuf::from("/tmp"));
    let rejected: Vec<&str> = loaded.issues.iter().map(|i| i.rule.as_str()).collect();
    assert_eq!(
        rejected,
        vec!["wrong action", "no patterns", "rules[3]", "good", "bad glob"]
    );
}

#[test]
fn invalid_global_section_is_an_error() {
    let file = write_temp(".json", r#"{ "config": { "max_total_delete": 0 }, "rules": [] }"#);
    assert!(RuleSet::load(Some(file.path())).is_err());

    let file = write_temp(".json", r#"{ "config": { "dry_run": "maybe" } }"#);
    assert!(RuleSet::load(Some(file.path())).is_err());
}

#[test]
fn malformed_document_is_an_error() {
    let file = write_temp(".json", "{ not json");
    assert!(RuleSet::load(Some(file.path())).is_err());

    let file = write_temp(".toml", "this is not valid toml [[[");
    assert!(RuleSet::load(Some(file.path())).is_err());
}

#[test]
fn missing_file_yields_defaults() {
    let tmp = TempDir::new().unwrap();

    let loaded = RuleSet::load(Some(&tmp.path().join("absent.json"))).unwrap();

    assert!(loaded.rule_set.config.dry_run);
    assert!(loaded.rule_set.get("System TEMP").is_some());
}

#[test]
fn save_toml_then_load() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("nested/rules.toml");

    RuleSet::with_defaults().save(&path).unwrap();
    let loaded = RuleSet::load(Some(&path)).unwrap();

    assert!(loaded.issues.is_empty());
    assert_eq!(loaded.rule_set, RuleSet::with_defaults());
}
