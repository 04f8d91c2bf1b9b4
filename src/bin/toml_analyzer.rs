use anyhow::Context;
use clap::Parser;
use oss_engagement::config::TomlConfig;
use oss_engagement::domain::ports::ConfigProvider;
use oss_engagement::utils::{logger, validation::Validate};
use oss_engagement::{AnalysisEngine, EngagementPipeline, LocalStorage};

#[derive(Parser)]
#[command(name = "toml-analyzer")]
#[command(about = "Run the engagement analysis from a TOML configuration file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "oss-engagement.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Override the package limit from config
    #[arg(long)]
    max_packages: Option<usize>,

    /// Show what would be analyzed without calling any API
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = TomlConfig::from_file(&args.config)
        .with_context(|| format!("failed to load config file '{}'", args.config))?;

    logger::init_cli_logger(args.verbose || config.verbose(), config.json_logs());
    tracing::info!("📁 Loaded configuration from: {}", args.config);

    if let Some(max) = args.max_packages {
        config.analysis.max_packages = Some(max);
        tracing::info!("🔧 max_packages overridden to: {}", max);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    display_config_summary(&config);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - no API calls will be made");
        return Ok(());
    }

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());

    let pipeline = EngagementPipeline::new(LocalStorage::default(), config)?;
    let engine = AnalysisEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(output_path) => {
            println!("📁 Results saved to: {}", output_path);
            Ok(())
        }
        Err(e) => {
            tracing::error!(
                "❌ Analysis failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
            std::process::exit(e.severity().exit_code());
        }
    }
}

fn display_config_summary(config: &TomlConfig) {
    let source = match (config.sbom_file(), config.packages_file()) {
        (Some(sbom), _) => format!("SBOM {}", sbom),
        (None, Some(file)) => format!("package file {}", file),
        (None, None) => "ecosyste.ms critical packages".to_string(),
    };
    let endpoints = config.endpoints();

    println!("📋 Configuration Summary:");
    println!("  Organization: {}", config.org_name());
    println!("  Email domain: {}", config.email_domain());
    println!(
        "  Time window: {} year(s){}",
        config.time_window_years(),
        if config.past_year_only() { " (past-year data)" } else { " (all-time data)" }
    );
    println!("  Packages: {}", source);
    if let Some(max) = config.max_packages() {
        println!("  Max packages: {}", max);
    }
    println!("  Output: {} ({})", config.output_file(), config.output_formats().join(", "));
    println!("  Request delay: {:?}", config.request_delay());
    println!(
        "  GitHub token: {}",
        if config.github_token().is_some() { "set" } else { "not set" }
    );
    println!("  Packages API: {}", endpoints.packages_url);
    println!("  Sponsors API: {}", endpoints.sponsors_url);
    println!();
}
