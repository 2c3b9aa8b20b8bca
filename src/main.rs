//! onevent command line
//!
//! Manages rules in the rules directory and fires triggers against them.

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use onevent::rules::{RuleOutcome, SkipReason, SystemLauncher, parse_extensions};
use onevent::{
    ActionKind, Config, DispatchReport, Dispatcher, RuleEditorBackend, RuleRecord, RuleStore,
    SaveWatcher, Trigger,
};

#[derive(Parser, Debug)]
#[command(name = "onevent")]
#[command(author, version, about = "File automation rules fired on save and build events")]
struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Workspace root (rules live in <DIR>/SavedEventActions)
    #[arg(short, long, value_name = "DIR", global = true)]
    workspace: Option<PathBuf>,

    /// Use this rules directory directly
    #[arg(long, value_name = "DIR", global = true)]
    rules_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print the rules directory
    Where,

    /// List all rules
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one rule
    Show { title: String },

    /// Create a rule
    Create {
        title: String,

        #[command(flatten)]
        fields: RuleFields,

        /// Create the rule disabled
        #[arg(long)]
        inactive: bool,
    },

    /// Change fields of an existing rule
    Update {
        title: String,

        #[command(flatten)]
        fields: RuleFields,
    },

    /// Rename a rule
    Rename { old: String, new: String },

    /// Delete a rule
    Delete { title: String },

    /// Enable a rule
    Enable { title: String },

    /// Disable a rule
    Disable { title: String },

    /// Fire a trigger ("On Save", "On Build") and run matching rules
    Fire {
        trigger: String,

        /// Extension of the saved document
        #[arg(short, long)]
        ext: Option<String>,
    },

    /// Run a build command, then fire "On Build"
    Build {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<String>,
    },

    /// Watch the workspace and fire "On Save" for saved files
    Watch,
}

#[derive(clap::Args, Debug)]
struct RuleFields {
    /// Trigger: "On Save" or "On Build"
    #[arg(long)]
    trigger: Option<String>,

    /// Action: "Copy File", "Copy Folder", "Play Sound" or "Run Command"
    #[arg(long)]
    action: Option<String>,

    /// Source file, folder or command line
    #[arg(long)]
    source: Option<String>,

    /// Output folder for copy actions
    #[arg(long)]
    output: Option<String>,

    /// Destination file name for "Copy File"
    #[arg(long)]
    output_file: Option<String>,

    /// Comma-separated extensions that fire the rule ("" clears the filter)
    #[arg(long)]
    extensions: Option<String>,
}

impl RuleFields {
    fn apply(self, record: &mut RuleRecord) {
        if let Some(trigger) = self.trigger {
            record.trigger = Trigger::parse(&trigger);
        }
        if let Some(action) = self.action {
            record.action = ActionKind::parse(&action);
        }
        if let Some(source) = self.source {
            record.source_path = source;
        }
        if let Some(output) = self.output {
            record.output_folder = output;
        }
        if let Some(output_file) = self.output_file {
            record.output_file = output_file;
        }
        if let Some(extensions) = self.extensions {
            record.allowed_extensions = parse_extensions(&extensions);
        }
    }
}

#[derive(Serialize)]
struct ListedRule<'a> {
    title: &'a str,
    #[serde(flatten)]
    rule: &'a RuleRecord,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    // Initialize logging
    let log_level = if cli.verbose {
        "debug"
    } else {
        config.general.log_level.as_str()
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("ONEVENT_LOG").unwrap_or_else(|_| log_level.to_string()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    onevent::notifications::init(config.general.notifications_enabled);

    let store = match &cli.rules_dir {
        Some(dir) => RuleStore::new(dir),
        None => config.rule_store(cli.workspace.as_deref()),
    };
    let dispatcher = || {
        Dispatcher::with_launcher(
            store.clone(),
            Arc::new(SystemLauncher::with_shell(config.general.shell.clone())),
        )
    };

    match cli.command {
        Commands::Where => {
            println!("{}", store.dir().display());
        }
        Commands::List { json } => {
            let rules = store.list()?;
            if json {
                let listed: Vec<ListedRule> = rules
                    .iter()
                    .map(|(title, rule)| ListedRule { title, rule })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&listed)?);
            } else if rules.is_empty() {
                println!("No rules in {}", store.dir().display());
            } else {
                println!("Rules:");
                for (i, (title, rule)) in rules.iter().enumerate() {
                    let status = if rule.is_active { "✓" } else { "✗" };
                    let filter = if rule.allowed_extensions.is_empty() {
                        String::new()
                    } else {
                        format!(" [{}]", rule.allowed_extensions.join(","))
                    };
                    println!(
                        "  {} [{}] {}: {} -> {}{}",
                        status,
                        i + 1,
                        title,
                        rule.trigger,
                        rule.action,
                        filter
                    );
                }
            }
        }
        Commands::Show { title } => {
            let rule = store.load(&title)?;
            println!("{}", title);
            println!("  Trigger:     {}", rule.trigger);
            println!("  Action:      {}", rule.action);
            println!("  Source:      {}", rule.source_path);
            println!("  Output:      {}", rule.output_folder);
            if !rule.output_file.is_empty() {
                println!("  Output file: {}", rule.output_file);
            }
            println!("  Active:      {}", rule.is_active);
            println!("  Extensions:  {}", rule.allowed_extensions.join(","));
        }
        Commands::Create {
            title,
            fields,
            inactive,
        } => {
            if fields.trigger.is_none() || fields.action.is_none() {
                anyhow::bail!("--trigger and --action are required to create a rule");
            }
            let mut rule = RuleRecord {
                is_active: !inactive,
                ..Default::default()
            };
            fields.apply(&mut rule);
            store.create(&title, &rule)?;
            println!("✓ Created rule '{}'", title);
        }
        Commands::Update { title, fields } => {
            let mut rule = store.load(&title)?;
            fields.apply(&mut rule);
            store.update(&title, &rule)?;
            println!("✓ Updated rule '{}'", title);
        }
        Commands::Rename { old, new } => {
            store.rename(&old, &new)?;
            println!("✓ Renamed '{}' -> '{}'", old, new);
        }
        Commands::Delete { title } => {
            store.delete(&title)?;
            println!("✓ Deleted rule '{}'", title);
        }
        Commands::Enable { title } => {
            store.set_active(&title, true)?;
            println!("✓ Enabled '{}'", title);
        }
        Commands::Disable { title } => {
            store.set_active(&title, false)?;
            println!("✓ Disabled '{}'", title);
        }
        Commands::Fire { trigger, ext } => {
            let report = dispatcher().process_rules(&Trigger::parse(&trigger), ext.as_deref());
            print_report(&report);
        }
        Commands::Build { command } => {
            let display = shlex::try_join(command.iter().map(String::as_str))
                .unwrap_or_else(|_| command.join(" "));
            println!("Building: {}", display);

            let status = std::process::Command::new(&command[0])
                .args(&command[1..])
                .status()
                .with_context(|| format!("Failed to run build command: {}", display))?;

            let report = dispatcher().process_rules(&Trigger::OnBuild, None);
            print_report(&report);

            if !status.success() {
                eprintln!("✗ Build failed with {}", status);
                std::process::exit(status.code().unwrap_or(1));
            }
        }
        Commands::Watch => {
            let root = match cli.workspace {
                Some(dir) => dir,
                None => std::env::current_dir().context("Could not determine workspace")?,
            };

            let mut watcher = SaveWatcher::new(dispatcher(), &config.watch)?;
            watcher.watch(&root, config.watch.recursive)?;
            println!(
                "Watching {} (rules: {}). Press Ctrl+C to stop.",
                root.display(),
                store.dir().display()
            );

            let shutdown = tokio::signal::ctrl_c();
            tokio::pin!(shutdown);
            let mut tick = tokio::time::interval(Duration::from_millis(250));

            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        watcher.process_events();
                    }
                    _ = &mut shutdown => break,
                }
            }

            println!("Stopped after {} saves", watcher.saves_dispatched());
        }
    }

    Ok(())
}

fn print_report(report: &DispatchReport) {
    let ext = report
        .extension
        .as_deref()
        .map(|e| format!(" (ext: {})", e))
        .unwrap_or_default();
    println!(
        "Fired '{}'{} at {}",
        report.trigger,
        ext,
        report.fired_at.format("%Y-%m-%d %H:%M:%S")
    );

    for (title, outcome) in &report.outcomes {
        match outcome {
            RuleOutcome::Executed => println!("  ✓ {}", title),
            RuleOutcome::Failed(message) => println!("  ✗ {}: {}", title, message),
            RuleOutcome::Skipped(SkipReason::TriggerMismatch) => {}
            RuleOutcome::Skipped(reason) => println!("  - {} (skipped: {:?})", title, reason),
        }
    }

    if report.executed().next().is_none() && report.failed().next().is_none() {
        println!("  No rules applied");
    }
}
