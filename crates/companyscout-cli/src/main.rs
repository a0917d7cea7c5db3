use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use companyscout_agents::default_registry;
use companyscout_core::{
    Gateway, Job, NoQuotes, ProviderRegistry, ResearchConfig, ResearchMode, ResearchOptions,
    ResearchOrchestrator, RunState, ScoringConfig, ScoringWeights, TelemetryOptions,
    init_telemetry, render_steps_markdown,
};
use serde_json::Value;
use tokio::runtime::Runtime;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "companyscout",
    version,
    about = "Research a company across interchangeable LLM-backed providers"
)]
struct Cli {
    /// Log filter (overrides RUST_LOG).
    #[arg(long, global = true)]
    log_filter: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Research a company with one or more providers.
    Research(ResearchArgs),
    /// List enabled providers.
    Providers(ListArgs),
    /// Show provider details side by side.
    Compare(CompareArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    Parallel,
    Sequential,
}

impl From<ModeArg> for ResearchMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Parallel => ResearchMode::Parallel,
            ModeArg::Sequential => ResearchMode::Sequential,
        }
    }
}

#[derive(Args, Debug)]
struct ResearchArgs {
    /// Company to research.
    company: String,

    #[arg(long, value_enum, default_value = "parallel")]
    mode: ModeArg,

    /// Comma-separated provider names (defaults to every enabled provider).
    #[arg(long, value_delimiter = ',')]
    providers: Vec<String>,

    /// Extra `key=value` parameters passed to every provider.
    #[arg(long = "param", value_parser = parse_param)]
    params: Vec<(String, String)>,

    /// Scoring weights as `funding,buzz,relevance`; must sum to 1.
    #[arg(long, value_delimiter = ',')]
    weights: Option<Vec<f64>>,

    /// Print the full job as JSON.
    #[arg(long)]
    json: bool,

    /// Include each provider's step trace in the text output.
    #[arg(long)]
    steps: bool,

    /// Skip appending the job to the audit log.
    #[arg(long)]
    no_log: bool,
}

#[derive(Args, Debug)]
struct ListArgs {
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct CompareArgs {
    /// Comma-separated provider names (defaults to every enabled provider).
    #[arg(long, value_delimiter = ',')]
    providers: Vec<String>,
}

fn parse_param(raw: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err("parameter key must not be empty".into());
    }
    Ok((key.to_string(), value.trim().to_string()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_telemetry(TelemetryOptions {
        env_filter: cli.log_filter.clone(),
        with_ansi: true,
        with_target: false,
    })?;

    let config = ResearchConfig::from_env()?;
    let rt = Runtime::new()?;
    rt.block_on(async move {
        match cli.command {
            Command::Research(args) => research_command(&config, args).await,
            Command::Providers(args) => providers_command(&config, args).await,
            Command::Compare(args) => compare_command(&config, args).await,
        }
    })
}

fn build_registry(config: &ResearchConfig, scoring: Arc<ScoringConfig>) -> Result<ProviderRegistry> {
    let gateway = Gateway::from_config(config).context("failed to build API gateway")?;
    Ok(default_registry(
        config,
        Arc::new(gateway),
        scoring,
        Arc::new(NoQuotes),
    ))
}

/// Explicit names win; otherwise every provider the registry has enabled.
async fn requested_providers(
    registry: &ProviderRegistry,
    providers: Vec<String>,
) -> Result<Vec<String>> {
    if !providers.is_empty() {
        return Ok(providers);
    }
    let enabled: Vec<String> = registry
        .list()
        .await?
        .into_iter()
        .map(|meta| meta.name)
        .collect();
    if enabled.is_empty() {
        bail!("no providers are enabled");
    }
    Ok(enabled)
}

async fn research_command(config: &ResearchConfig, args: ResearchArgs) -> Result<()> {
    let scoring = Arc::new(ScoringConfig::default());
    if let Some(weights) = &args.weights {
        let [funding_stage, market_buzz, strategic_relevance] = weights[..] else {
            bail!("--weights expects exactly three values");
        };
        scoring.update_weights(ScoringWeights {
            funding_stage,
            market_buzz,
            strategic_relevance,
        })?;
    }

    let registry = build_registry(config, scoring)?;
    let providers = requested_providers(&registry, args.providers).await?;
    let mut orchestrator = ResearchOrchestrator::new(Arc::new(registry));
    if !args.no_log {
        orchestrator = orchestrator.with_job_log(&config.log_dir);
    }

    let options = args
        .params
        .into_iter()
        .fold(ResearchOptions::default(), |options, (key, value)| {
            options.with(key, Value::String(value))
        });
    let mode = ResearchMode::from(args.mode);
    info!(company = %args.company, mode = mode.as_str(), ?providers, "starting research");

    let job = orchestrator
        .execute(mode, &args.company, &providers, &options)
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&job)?);
    } else {
        print_job(&job, args.steps);
    }
    Ok(())
}

fn print_job(job: &Job, with_steps: bool) {
    println!(
        "Job {} [{}] {} mode: {}",
        job.id,
        job.company_name,
        job.mode.as_str(),
        job.status.as_str()
    );
    if let Some(error) = &job.error {
        println!("  error: {error}");
    }
    for name in &job.providers {
        let Some(slot) = job.per_provider_status.get(name) else {
            continue;
        };
        match (slot.status, job.per_provider_result.get(name)) {
            (RunState::Completed, Some(entity)) => {
                let score = &entity.score_breakdown;
                println!(
                    "  {name}: score {} (funding {:.1}, buzz {:.1}, relevance {:.1})",
                    score.total_score, score.funding_score, score.buzz_score, score.relevance_score
                );
                println!(
                    "    founded {}, {}, focus {}, funding {}",
                    entity
                        .founding_year
                        .map(|year| year.to_string())
                        .unwrap_or_else(|| "?".into()),
                    entity.location.as_deref().unwrap_or("?"),
                    entity.focus_area.as_deref().unwrap_or("?"),
                    entity.funding_amount.as_deref().unwrap_or("?"),
                );
                if with_steps {
                    println!("{}", render_steps_markdown(&entity.agent_steps));
                }
            }
            _ => println!(
                "  {name}: {} {}",
                slot.status.as_str(),
                slot.error.as_deref().unwrap_or("")
            ),
        }
    }
    if let Some(accumulated) = &job.accumulated {
        if let Ok(text) = serde_json::to_string_pretty(accumulated) {
            println!("Accumulated findings:\n{text}");
        }
    }
}

async fn providers_command(config: &ResearchConfig, args: ListArgs) -> Result<()> {
    let registry = build_registry(config, Arc::new(ScoringConfig::default()))?;
    let providers = registry.list().await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&providers)?);
        return Ok(());
    }
    for meta in providers {
        println!("{} v{}: {}", meta.name, meta.version, meta.description);
        println!("  capabilities: {}", meta.capabilities.join(", "));
        println!("  limitations: {}", meta.limitations.join(", "));
    }
    Ok(())
}

async fn compare_command(config: &ResearchConfig, args: CompareArgs) -> Result<()> {
    let registry = build_registry(config, Arc::new(ScoringConfig::default()))?;
    let providers = requested_providers(&registry, args.providers).await?;
    let comparison = registry.compare(&providers).await?;
    println!("{}", serde_json::to_string_pretty(&comparison)?);
    Ok(())
}
