use anyhow::Context;
use clap::{Parser, Subcommand};
use sea_orm_migration::MigratorTrait;
use std::io::Read;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use xjy_moderation::{
    config::{self, moderation::ModerationConfig, rules::RuleSet},
    migration::Migrator,
    models::{ContentKey, ContentType},
    pagination,
    services::{
        analyzer::ContentAnalyzer,
        report::{FileReportRequest, Resolution},
    },
    ModerationService,
};

#[derive(Parser)]
#[command(name = "xjy-moderation", version, about = "Forum report escalation and content analysis")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply database migrations
    Migrate,
    /// Analyze text (argument or stdin) and print a recommendation
    Analyze { text: Option<String> },
    /// File a report and run escalation for its content item
    Report {
        #[arg(long)]
        content_type: String,
        #[arg(long)]
        content_id: i32,
        #[arg(long)]
        reporter: i32,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// List every report filed against one content item
    Reports {
        #[arg(long)]
        content_type: String,
        #[arg(long)]
        content_id: i32,
    },
    /// Resolve one report by hand
    Resolve {
        #[arg(long)]
        id: i32,
        #[arg(long)]
        by: i32,
        /// DISMISSED or CONTENT_REMOVED, for instance
        #[arg(long)]
        action: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List unresolved reports across all content, newest first
    Unresolved {
        #[arg(long)]
        page: Option<u64>,
        #[arg(long)]
        per_page: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "xjy_moderation=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    // stdout is reserved for command output
    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let cli = Cli::parse();

    // Fail fast on bad rules/thresholds before touching the database.
    let analyzer = ContentAnalyzer::new(&RuleSet::from_env()?)?;
    let moderation_config = ModerationConfig::from_env()?;

    match cli.command {
        Command::Analyze { text } => {
            let text = match text {
                Some(text) => text,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("Failed to read stdin")?;
                    buf
                }
            };
            print_json(&analyzer.recommend(&text))?;
        }
        Command::Migrate => {
            let db = config::database::get_database().await?;
            Migrator::up(&db, None).await?;
            tracing::info!("Database migrations applied successfully");
        }
        Command::Report {
            content_type,
            content_id,
            reporter,
            reason,
            description,
        } => {
            let service = connect(analyzer, moderation_config).await?;
            let request = FileReportRequest {
                content_type,
                content_id,
                reason,
                description,
            };
            let filed = service.file_report(reporter, request).await?;
            print_json(&filed)?;
            service.flush_notifications().await;
        }
        Command::Reports {
            content_type,
            content_id,
        } => {
            let service = connect(analyzer, moderation_config).await?;
            let content_type: ContentType = content_type.parse()?;
            let reports = service
                .list_for_content(ContentKey::new(content_type, content_id))
                .await?;
            print_json(&reports)?;
        }
        Command::Resolve {
            id,
            by,
            action,
            notes,
        } => {
            let service = connect(analyzer, moderation_config).await?;
            let resolution = Resolution {
                resolved_by: by,
                action: action.parse()?,
                notes,
            };
            print_json(&service.reports().resolve(id, &resolution).await?)?;
        }
        Command::Unresolved { page, per_page } => {
            let service = connect(analyzer, moderation_config).await?;
            let (page, per_page) = pagination::normalize(page, per_page);
            print_json(&service.list_unresolved_page(page, per_page).await?)?;
        }
    }

    Ok(())
}

async fn connect(
    analyzer: ContentAnalyzer,
    moderation_config: ModerationConfig,
) -> anyhow::Result<ModerationService> {
    let db = config::database::get_database().await?;
    tracing::debug!("Database connected successfully");
    Ok(ModerationService::with_database(
        db,
        analyzer,
        moderation_config,
    ))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
