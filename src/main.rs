mod api;
mod server;

use clap::{Args, Parser, Subcommand};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use techblog_ai::config::AppConfig;
use techblog_ai::coordinator::NoProgress;
use techblog_ai::llm::LlmClient;
use techblog_ai::store::JsonTagStore;
use techblog_ai::{
    default_score, format_confidence, format_score, AiCoordinator, CategoryApplier, ContentType,
    FeatureFlags, FeatureOutcome, FeatureRequest, IntegrationResult, LlmFeatureInvoker,
    ScoreBreakdown,
};

#[derive(Parser)]
#[command(name = "techblog-ai", about = "AI enhancement for technical blog posts")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run style upgrade, SEO and category recommendation on a post.
    Enhance(EnhanceArgs),
    /// Score the readability of a post.
    Score(ScoreArgs),
    /// Serve the HTTP API.
    Serve(ServeArgs),
}

#[derive(Args, Debug, Clone)]
struct EnhanceArgs {
    #[arg(long)]
    title: Option<String>,
    /// Post file; reads stdin when omitted.
    #[arg(long)]
    file: Option<PathBuf>,
    #[arg(long, default_value = "markdown")]
    content_type: String,
    #[arg(long)]
    no_styling: bool,
    #[arg(long)]
    no_seo: bool,
    #[arg(long)]
    no_categories: bool,
    /// Focus keyword for SEO metadata; repeatable.
    #[arg(long = "keyword")]
    keywords: Vec<String>,
    /// Tag this post with confident category recommendations.
    #[arg(long)]
    post_id: Option<String>,
    #[arg(long)]
    threshold: Option<f64>,
    /// Print the raw result as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug, Clone)]
struct ScoreArgs {
    #[arg(long)]
    file: Option<PathBuf>,
    #[arg(long, default_value = "markdown")]
    content_type: String,
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    #[arg(long, default_value_t = 8787)]
    port: u16,
}

#[tokio::main]
async fn main() {
    load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let cli = Cli::parse();
    let (config, config_path) = AppConfig::load(cli.config)?;
    if let Some(path) = config_path.filter(|path| path.exists()) {
        tracing::info!(path = %path.display(), "loaded config");
    }

    match cli.command {
        Command::Enhance(args) => run_enhance(args, config).await,
        Command::Score(args) => run_score(args, config).await,
        Command::Serve(args) => server::serve(args, config).await,
    }
}

fn build_invoker(config: &AppConfig) -> Result<Arc<LlmFeatureInvoker<LlmClient>>, String> {
    let client =
        LlmClient::from_config(&config.ai)?.ok_or_else(|| "AI_API_KEY is not set".to_string())?;
    tracing::info!(model = client.model(), "AI client configured");
    Ok(Arc::new(LlmFeatureInvoker::new(
        client,
        config.categories.catalog.clone(),
    )))
}

async fn run_enhance(args: EnhanceArgs, config: AppConfig) -> Result<(), String> {
    let content = read_content(args.file.as_deref())?;
    let mut request = FeatureRequest::new(String::new(), content);
    request.title = args.title.filter(|title| !title.trim().is_empty());
    request.content_type = parse_content_type(&args.content_type)?;
    request.options.focus_keywords = args.keywords;
    request
        .options
        .default_max_categories(config.categories.max_recommendations);

    let flags = FeatureFlags {
        enable_styling: !args.no_styling,
        enable_seo: !args.no_seo,
        enable_categories: !args.no_categories,
    };
    if !flags.any() {
        return Err("all features disabled; nothing to do".to_string());
    }

    let coordinator = AiCoordinator::new(build_invoker(&config)?);
    let result = coordinator
        .process_with(request, flags, Arc::new(NoProgress))
        .await;

    let applied = match (&args.post_id, &result.categories) {
        (Some(post_id), Some(FeatureOutcome::Success(suggestions))) => {
            let store = JsonTagStore::load(config.store.path.clone())
                .await
                .map_err(|err| format!("failed to open tag store: {:#}", err))?;
            let applier = CategoryApplier::new(Arc::new(store));
            let threshold = args
                .threshold
                .unwrap_or(config.categories.confidence_threshold);
            Some(
                applier
                    .apply_if_confident(post_id, &suggestions.recommendations, threshold)
                    .await,
            )
        }
        _ => None,
    };

    if args.json {
        let payload = serde_json::to_string_pretty(&result)
            .map_err(|err| format!("failed to serialize result: {}", err))?;
        println!("{}", payload);
    } else {
        print_result(&result);
    }

    if let Some(applied) = applied {
        if applied {
            println!("\nCategory tags applied.");
        } else {
            return Err("failed to apply category tags".to_string());
        }
    }

    if result.overall_success {
        Ok(())
    } else {
        Err("one or more AI features failed".to_string())
    }
}

async fn run_score(args: ScoreArgs, config: AppConfig) -> Result<(), String> {
    let content = read_content(args.file.as_deref())?;
    let content_type = parse_content_type(&args.content_type)?;
    let invoker = build_invoker(&config)?;

    let (score, fallback) = match invoker
        .readability(&content, content_type)
        .await
        .map_err(|err| err.to_string())?
    {
        Some(score) => (score, false),
        None => (default_score(), true),
    };

    if args.json {
        let payload = serde_json::to_string_pretty(&score)
            .map_err(|err| format!("failed to serialize score: {}", err))?;
        println!("{}", payload);
    } else {
        if fallback {
            println!("AI response could not be parsed; showing default scores.");
        }
        print_score(&score);
    }
    Ok(())
}

fn print_result(result: &IntegrationResult) {
    match &result.styling {
        Some(FeatureOutcome::Success(upgrade)) => {
            println!("Style upgrade:");
            for change in &upgrade.changes {
                println!("- {}", change);
            }
            if let Some(score) = &upgrade.readability {
                println!();
                print_score(score);
            }
            println!("\n{}\n", upgrade.enhanced_content);
        }
        Some(FeatureOutcome::Failure(err)) => println!("Style upgrade failed: {}", err),
        None => {}
    }

    match &result.seo {
        Some(FeatureOutcome::Success(seo)) => {
            println!("SEO:");
            println!("  title: {}", seo.meta_title);
            println!("  description: {}", seo.meta_description);
            println!("  keywords: {}", seo.keywords.join(", "));
            println!("  slug: {}", seo.slug);
        }
        Some(FeatureOutcome::Failure(err)) => println!("SEO failed: {}", err),
        None => {}
    }

    match &result.categories {
        Some(FeatureOutcome::Success(suggestions)) => {
            println!("Categories:");
            for rec in &suggestions.recommendations {
                println!("  {} ({})", rec.category_id, format_confidence(rec.confidence));
            }
        }
        Some(FeatureOutcome::Failure(err)) => println!("Categories failed: {}", err),
        None => {}
    }
}

fn print_score(score: &ScoreBreakdown) {
    println!(
        "Readability: overall {} | headings {} | paragraphs {} | code {} | clarity {}",
        format_score(score.overall),
        format_score(score.heading_structure),
        format_score(score.paragraph_length),
        format_score(score.code_quality),
        format_score(score.clarity)
    );
    for suggestion in &score.suggestions {
        println!("- {}", suggestion);
    }
}

fn parse_content_type(value: &str) -> Result<ContentType, String> {
    ContentType::from_str(value).ok_or_else(|| format!("invalid content type: {}", value))
}

fn read_content(path: Option<&Path>) -> Result<String, String> {
    let content = match path {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|err| format!("failed reading {}: {}", path.display(), err))?,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|err| format!("failed reading stdin: {}", err))?;
            buffer
        }
    };
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err("missing post content: pass --file or pipe stdin".to_string());
    }
    Ok(trimmed.to_string())
}

fn load_dotenv() {
    let _ = dotenvy::dotenv();
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let manifest_path = Path::new(manifest_dir).join(".env");
    let _ = dotenvy::from_path(manifest_path);
}
