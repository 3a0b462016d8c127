use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use label_migrate::commands;
use label_migrate::config::{Config, ConfigOverrides, OutputFormat, StrategyKind};
use label_migrate::logging::{self, LogLevel};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "label-migrate")]
#[command(author, version, about = "Find hardcoded UI text and migrate it to label references", long_about = None)]
struct Cli {
    /// Path to configuration file (default: ./label-migrate.json if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level: error, warn, info or debug (default: $LABEL_MIGRATE_LOG or info)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by `scan` and `migrate`.
#[derive(Args, Debug, Default)]
struct DetectArgs {
    /// Project root (overrides config)
    #[arg(long)]
    root: Option<String>,

    /// Directory to scan, relative to the root; repeatable (overrides config)
    #[arg(long = "dir")]
    dirs: Vec<String>,

    /// Console output format
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Do not report CJK text
    #[arg(long)]
    no_chinese: bool,

    /// Do not report English JSX text and attributes
    #[arg(long)]
    no_english: bool,

    /// Detection strategy to run; repeatable (default: ast and line)
    #[arg(long = "strategy", value_enum)]
    strategies: Vec<StrategyKind>,
}

#[derive(Subcommand)]
enum Commands {
    /// Report hardcoded text without changing anything
    Scan {
        #[command(flatten)]
        detect: DetectArgs,

        /// Omit line and column numbers from the output
        #[arg(long)]
        no_line_numbers: bool,

        /// Also write a Markdown table report to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Store labels for hardcoded text and rewrite sources to reference them
    Migrate {
        #[command(flatten)]
        detect: DetectArgs,

        /// Plan the migration and report it without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Stop starting new files after this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Label store path (overrides config)
        #[arg(long)]
        store: Option<String>,

        /// Markdown report path (overrides config)
        #[arg(long)]
        report: Option<String>,

        /// Language code recorded for the extracted text (overrides config)
        #[arg(long)]
        language: Option<String>,
    },

    /// Initialize a label scope from a JSON object of key/text pairs
    Seed {
        /// Scope to seed; skipped when it already has labels
        #[arg(long)]
        scope: String,

        /// JSON file with `{ "key": "text" }` entries
        #[arg(long)]
        from: PathBuf,

        /// Label store path (overrides config)
        #[arg(long)]
        store: Option<String>,

        /// Language code of the entries (overrides config)
        #[arg(long)]
        language: Option<String>,
    },
}

impl DetectArgs {
    fn overrides(self) -> ConfigOverrides {
        ConfigOverrides {
            root: self.root,
            dirs: self.dirs,
            output_format: self.format,
            no_chinese: self.no_chinese,
            no_english: self.no_english,
            strategies: self.strategies,
            ..Default::default()
        }
    }
}

fn load_config(cli_config: Option<&PathBuf>, overrides: &ConfigOverrides) -> Result<Config> {
    let mut config = Config::load_or_default(cli_config)?;
    config.apply_overrides(overrides);
    config.validate()?;
    logging::reserve_stdout(config.output_format == OutputFormat::Json);
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_level);

    match cli.command {
        Commands::Scan {
            detect,
            no_line_numbers,
            report,
        } => {
            let config = load_config(cli.config.as_ref(), &detect.overrides())?;
            commands::scan::run(&config, !no_line_numbers, report.as_deref())?;
        }
        Commands::Migrate {
            detect,
            dry_run,
            timeout,
            store,
            report,
            language,
        } => {
            let overrides = ConfigOverrides {
                store,
                report_path: report,
                language,
                ..detect.overrides()
            };
            let config = load_config(cli.config.as_ref(), &overrides)?;
            commands::migrate::run(&config, dry_run, timeout)?;
        }
        Commands::Seed {
            scope,
            from,
            store,
            language,
        } => {
            let overrides = ConfigOverrides {
                store,
                language,
                ..Default::default()
            };
            let config = load_config(cli.config.as_ref(), &overrides)?;
            commands::seed::run(&config, &scope, &from)?;
        }
    }

    Ok(())
}
