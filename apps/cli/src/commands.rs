//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use profilecrawl_browser::{BridgeAgent, BridgeConfig, BridgeSessionProvider};
use profilecrawl_core::{MergedReport, ProgressReporter, profile_subject};
use profilecrawl_shared::{
    AppConfig, Link, RunConfig, TaskOutcome, init_config, load_config, load_subject,
};
use profilecrawl_strategies::StrategyRegistry;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// ProfileCrawl: extract a structured profile of a person from their links.
#[derive(Parser)]
#[command(
    name = "profilecrawl",
    version,
    about = "Crawl a person's profiles and websites into one structured report.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Extract every link of a subject file and write the merged report.
    Crawl(CrawlArgs),

    /// Print the strategy each URL would be extracted with.
    Classify {
        /// URLs to classify.
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Arguments of `crawl`. Flags override the config file.
#[derive(Args, Debug)]
pub(crate) struct CrawlArgs {
    /// Subject file (TOML with `name` and `[[links]]`).
    #[arg(short, long)]
    pub subject: PathBuf,

    /// Output directory.
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Number of browser sessions (parallel agents).
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Cap on every strategy's step budget.
    #[arg(long)]
    pub max_steps: Option<u32>,

    /// Global run deadline in seconds (0 disables it).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Write agent history next to each extraction.
    #[arg(long)]
    pub verbose_artifacts: bool,
}

impl CrawlArgs {
    /// Merge these flags over the config file's defaults.
    pub fn run_config(&self, config: &AppConfig) -> RunConfig {
        let mut run = RunConfig::from(config);
        if let Some(out) = &self.out {
            run.out_dir = out.clone();
        }
        if let Some(concurrency) = self.concurrency {
            run.concurrency = concurrency;
        }
        if let Some(max_steps) = self.max_steps {
            run.max_steps = max_steps;
        }
        if let Some(secs) = self.timeout {
            run.run_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        run.verbose |= self.verbose_artifacts;
        run
    }
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "profilecrawl=info",
        1 => "profilecrawl=debug",
        _ => "profilecrawl=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Crawl(args) => cmd_crawl(&args).await,
        Command::Classify { urls } => cmd_classify(&urls),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_crawl(args: &CrawlArgs) -> Result<()> {
    let config = load_config()?;
    let subject = load_subject(&args.subject)?;
    let run_config = args.run_config(&config);
    let bridge = BridgeConfig::from(&config);

    info!(
        subject = %subject.name,
        links = subject.links.len(),
        sessions = run_config.concurrency,
        model = %bridge.model,
        "starting crawl"
    );

    let registry = StrategyRegistry::new()?;
    let provider = BridgeSessionProvider::new(bridge.clone());
    let agent = BridgeAgent::new(bridge);
    let reporter = CliProgress::new();

    let run = profile_subject(&subject, run_config, registry, provider, agent, &reporter).await?;

    println!();
    println!("  Profile of {} written.", run.report.subject);
    for outcome in &run.report.outcomes {
        let status = if outcome.success { "ok  " } else { "FAIL" };
        println!("  {status} {:<12} {}", outcome.strategy, outcome.url);
        if let Some(error) = &outcome.error {
            println!("         {error}");
        }
    }
    println!();
    println!("  JSON:     {}", run.paths.json.display());
    println!("  Markdown: {}", run.paths.markdown.display());
    if !run.teardown.is_clean() {
        println!("  Teardown: {} session(s) failed to close", run.teardown.failures.len());
    }
    println!();

    if run.report.successes() == 0 {
        return Err(eyre!("no link could be extracted"));
    }
    Ok(())
}

fn cmd_classify(urls: &[String]) -> Result<()> {
    let registry = StrategyRegistry::new()?;
    for url in urls {
        println!("{:<12} {url}", registry.classify(url).name());
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner with a link counter.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template("{spinner:.cyan} [{pos}/{len}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }
}

impl ProgressReporter for CliProgress {
    fn task_started(&self, strategy: &str, link: &Link) {
        self.bar.inc_length(1);
        self.bar.set_message(format!("{strategy}: {}", link.url));
    }

    fn task_finished(&self, outcome: &TaskOutcome) {
        self.bar.inc(1);
        let verdict = if outcome.success { "done" } else { "failed" };
        self.bar
            .set_message(format!("{} {verdict}: {}", outcome.strategy, outcome.link.url));
    }

    fn done(&self, _report: &MergedReport) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crawl_args(argv: &[&str]) -> CrawlArgs {
        let mut full = vec!["profilecrawl", "crawl"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Command::Crawl(args) => args,
            _ => panic!("expected crawl"),
        }
    }

    #[test]
    fn flags_override_config() {
        let args = crawl_args(&[
            "--subject",
            "ada.toml",
            "--out",
            "reports",
            "--concurrency",
            "5",
            "--max-steps",
            "40",
            "--timeout",
            "600",
            "--verbose-artifacts",
        ]);
        let run = args.run_config(&AppConfig::default());

        assert_eq!(run.out_dir, PathBuf::from("reports"));
        assert_eq!(run.concurrency, 5);
        assert_eq!(run.max_steps, 40);
        assert_eq!(run.run_timeout, Some(Duration::from_secs(600)));
        assert!(run.verbose);
    }

    #[test]
    fn config_defaults_apply_without_flags() {
        let mut config = AppConfig::default();
        config.defaults.run_timeout_secs = 90;
        let run = crawl_args(&["--subject", "ada.toml"]).run_config(&config);

        assert_eq!(run.out_dir, PathBuf::from("out"));
        assert_eq!(run.concurrency, 3);
        assert_eq!(run.run_timeout, Some(Duration::from_secs(90)));
        assert!(!run.verbose);
    }

    #[test]
    fn zero_timeout_disables_deadline() {
        let mut config = AppConfig::default();
        config.defaults.run_timeout_secs = 90;
        let run = crawl_args(&["--subject", "ada.toml", "--timeout", "0"]).run_config(&config);
        assert!(run.run_timeout.is_none());
    }

    #[test]
    fn classify_requires_a_url() {
        assert!(Cli::try_parse_from(["profilecrawl", "classify"]).is_err());
    }
}
