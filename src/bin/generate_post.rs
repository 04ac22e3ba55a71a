use clap::Parser;
use site_cms::ai::blog::BlogRequest;
use site_cms::utils::error::ErrorSeverity;
use site_cms::utils::{logger, validation::Validate};
use site_cms::{open_store, AppConfig, AppState};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "generate_post")]
#[command(about = "Generate a draft blog post with the configured AI providers")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "site-cms.toml", env = "SITE_CMS_CONFIG")]
    config: PathBuf,

    /// Article topic (defaults to the top trend for the keyword)
    #[arg(short, long)]
    topic: Option<String>,

    /// Keyword for the trend lookup (defaults to ai.blog.seed_keyword)
    #[arg(short, long)]
    keyword: Option<String>,

    #[arg(long)]
    tone: Option<String>,

    #[arg(long)]
    audience: Option<String>,

    #[arg(long)]
    sections: Option<usize>,

    #[arg(long)]
    category: Option<String>,

    /// Replace the given topic with the top related trend
    #[arg(long)]
    trends: bool,

    /// Skip image generation
    #[arg(long)]
    no_images: bool,

    /// Show what would be generated without calling any provider
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let (config, from_file) = match site_cms::config::load_or_default(&args.config) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config.display(), e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 初始化日誌
    logger::init_logger(&config.logging.format, args.verbose);
    tracing::info!("🚀 Starting blog post generation");
    if !from_file {
        tracing::warn!("⚠️  {} not found, using defaults", args.config.display());
    }
    config.warn_unset_env_vars();

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let request = BlogRequest {
        topic: args.topic.clone(),
        keyword: args.keyword.clone(),
        use_trends: args.trends,
        tone: args.tone.clone(),
        audience: args.audience.clone(),
        sections: args.sections,
        keywords: Vec::new(),
        category: args.category.clone(),
        generate_images: args.no_images.then_some(false),
    };

    if args.dry_run {
        display_summary(&config, &request);
        return Ok(());
    }

    let result = async {
        let store = open_store(&config).await?;
        let state = AppState::new(config, store)?;
        state.blog.generate(request, None).await
    }
    .await;

    match result {
        Ok(generation) => {
            tracing::info!(
                "✅ Saved draft #{} `{}` ({} images, {} failed)",
                generation.post.id,
                generation.post.slug,
                generation.images_generated,
                generation.images_failed
            );
            println!("{}", serde_json::to_string_pretty(&generation.post)?);
        }
        Err(e) => {
            tracing::error!(
                "❌ Generation failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low | ErrorSeverity::High => 1,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::Critical => 3,
            };
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

fn display_summary(config: &AppConfig, request: &BlogRequest) {
    let text = &config.ai.text;
    eprintln!("📋 Generation Summary:");
    eprintln!(
        "  Text: {} ({}){}",
        text.primary.name,
        text.primary.model,
        if text.primary.is_configured() { "" } else { " ⚠️ no API key" }
    );
    if let Some(fallback) = &text.fallback {
        eprintln!("  Fallback: {} ({})", fallback.name, fallback.model);
    }
    eprintln!(
        "  Topic: {}",
        request
            .topic
            .as_deref()
            .or(request.keyword.as_deref())
            .or(config.ai.blog.seed_keyword.as_deref())
            .unwrap_or("(missing)")
    );
    eprintln!(
        "  Trends: {}",
        (request.topic.is_none() || request.use_trends)
            && !config.ai.trends.api_key.trim().is_empty()
    );
    eprintln!(
        "  Images: {}",
        request.generate_images.unwrap_or(config.ai.blog.generate_images)
            && config.ai.image.is_configured()
    );
    eprintln!("  Storage: {}", config.storage.data_dir);
}
