use anyhow::Result;
use clap::{CommandFactory, Parser};
use std::path::Path;
use std::time::SystemTime;

use reclaim::cli::{Cli, Command, RulesCommand};
use reclaim::commands;
use reclaim::config::{LoadedRules, RuleSet};
use reclaim::engine::PackageCache;
use reclaim::logs;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let rules_path = cli.config.clone().unwrap_or_else(RuleSet::default_path);

    // `rules init` must work even when the existing file is broken
    let loaded = match &cli.command {
        Command::Completions(_) | Command::Rules(RulesCommand::Init { .. }) => LoadedRules {
            rule_set: RuleSet::with_defaults(),
            issues: Vec::new(),
        },
        _ => RuleSet::load(Some(&rules_path))?,
    };

    let config = &loaded.rule_set.config;
    init_logging(cli.verbose, cli.quiet, config.log_dir.as_deref());
    if let Some(dir) = &config.log_dir {
        let removed = logs::age_off_logs(dir, config.log_age_off_days, SystemTime::now());
        tracing::debug!(removed, "Aged off old log files");
    }

    tracing::debug!(
        path = %rules_path.display(),
        rules = loaded.rule_set.rules.len(),
        "Loaded rules"
    );

    let is_rules_command = matches!(cli.command, Command::Rules(_));
    if !cli.quiet && !is_rules_command {
        for issue in &loaded.issues {
            eprintln!("Warning: skipping invalid {}", issue);
        }
    }

    // Dispatch to subcommand
    match cli.command {
        Command::Scan(args) => {
            tracing::info!(?args, "Starting scan");
            commands::scan::run(loaded.rule_set, args, cli.quiet)?;
        }
        Command::Clean(args) => {
            tracing::info!(?args, "Starting clean");
            commands::clean::run(loaded.rule_set, args, cli.quiet)?;
        }
        Command::PurgePip(args) => {
            tracing::info!(?args, "Starting pip purge");
            commands::purge::run(loaded.rule_set, PackageCache::Pip, args, cli.quiet)?;
        }
        Command::PurgeNpm(args) => {
            tracing::info!(?args, "Starting npm purge");
            commands::purge::run(loaded.rule_set, PackageCache::Npm, args, cli.quiet)?;
        }
        Command::Run(args) => {
            tracing::info!(operation = %args.operation, "Scheduled run");
            commands::clean::execute(loaded.rule_set, args.operation, args.overrides, cli.quiet)?;
        }
        Command::Rules(command) => {
            commands::rules::run(command, &rules_path, loaded)?;
        }
        Command::Completions(args) => {
            clap_complete::generate(
                args.shell,
                &mut Cli::command(),
                "reclaim",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

fn init_logging(verbosity: u8, quiet: bool, log_dir: Option<&Path>) {
    use std::sync::Mutex;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let level = if quiet {
        "warn"
    } else {
        match verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("reclaim={}", level)));

    let file_layer = log_dir.and_then(|dir| match logs::open_log_file(dir) {
        Ok((_, file)) => Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file))),
        Err(e) => {
            eprintln!("Warning: file logging disabled: {}", e);
            None
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(file_layer)
        .with(filter)
        .init();
}
