//! # LocalBoost — content-marketing autopilot for local businesses
//!
//! Usage:
//!   localboost serve                          # Scheduler engine + dashboard gateway
//!   localboost schedule list                  # Show templates and their cadence
//!   localboost schedule add --name ...        # Create a template
//!   localboost schedule rm <id>               # Delete a template
//!   localboost schedule pause|resume <id>     # Toggle a template
//!   localboost sync                           # One stats pass, printed
//!   localboost fire <id>                      # Run one firing right now
//!   localboost keywords                       # Show keyword clusters per area

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use localboost_channels::ChannelRegistry;
use localboost_core::config::LocalBoostConfig;
use localboost_core::types::{ChannelReport, Frequency, Platform, PostCategory, ScheduleTemplate};
use localboost_keywords::KeywordStore;
use localboost_scheduler::{PostHistory, PublishPipeline, SyncAggregator, TemplateStore};

#[derive(Parser)]
#[command(
    name = "localboost",
    version,
    about = "📣 LocalBoost — scheduled multi-channel publishing for local businesses"
)]
struct Cli {
    /// Config file path (default: ~/.localboost/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler engine and the dashboard gateway
    Serve,

    /// Manage schedule templates
    Schedule {
        #[command(subcommand)]
        action: ScheduleAction,
    },

    /// Run one channel-stats sync pass and print the snapshot
    Sync,

    /// Run one firing of a schedule right now
    Fire {
        /// Schedule id (full or unambiguous prefix)
        id: String,
    },

    /// Show keyword clusters per serving area
    Keywords,
}

#[derive(Subcommand)]
enum ScheduleAction {
    /// List all templates
    List,

    /// Create a template
    Add {
        /// Template name
        #[arg(long)]
        name: String,

        /// Topic/seed text handed to the content generator
        #[arg(long)]
        content: String,

        /// "daily" or "weekly"
        #[arg(long, default_value = "daily")]
        frequency: String,

        /// Weekday for weekly templates (0 = Sunday .. 6 = Saturday)
        #[arg(long, default_value = "1")]
        day_of_week: u8,

        /// Local firing time, "HH:MM" 24h
        #[arg(long, default_value = "09:00")]
        time: String,

        /// Comma-separated platform names (google_business, facebook, instagram, linkedin, twitter)
        #[arg(long, default_value = "facebook")]
        platforms: String,

        /// promotional | educational | engagement | seasonal
        #[arg(long, default_value = "promotional")]
        category: String,

        /// Create the template paused
        #[arg(long)]
        paused: bool,
    },

    /// Remove a template
    Rm {
        /// Schedule id (full or unambiguous prefix)
        id: String,
    },

    /// Pause a template (it stays stored but never fires)
    Pause { id: String },

    /// Resume a paused template
    Resume { id: String },
}

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

fn cadence(frequency: &Frequency, time_of_day: &str) -> String {
    match frequency {
        Frequency::Daily => format!("daily {time_of_day}"),
        Frequency::Weekly { day_of_week } => {
            let day = WEEKDAYS.get(*day_of_week as usize).copied().unwrap_or("???");
            format!("weekly {day} {time_of_day}")
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "debug,hyper=info,reqwest=info"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => {
            let expanded = shellexpand::tilde(path).to_string();
            LocalBoostConfig::load_from(Path::new(&expanded))?
        }
        None => LocalBoostConfig::load()?,
    };

    match cli.command {
        Commands::Serve => serve(config).await,
        Commands::Schedule { action } => schedule(action),
        Commands::Sync => sync_once(config).await,
        Commands::Fire { id } => fire_once(config, &id).await,
        Commands::Keywords => keywords(config),
    }
}

/// Run the whole engine until interrupted.
async fn serve(config: LocalBoostConfig) -> Result<()> {
    println!("📣 LocalBoost v{}", env!("CARGO_PKG_VERSION"));
    println!("   Business:  {}", config.business.name);
    println!("   Timezone:  {}", config.business.timezone);
    println!(
        "   Dashboard: http://{}:{}",
        config.gateway.host, config.gateway.port
    );
    println!();

    tokio::select! {
        result = localboost_gateway::server::start(&config) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("⏹️ Interrupted — shutting down");
            Ok(())
        }
    }
}

fn open_store() -> TemplateStore {
    TemplateStore::new(&TemplateStore::default_dir())
}

/// Resolve a full or prefix id against the stored templates.
fn find_template(templates: &[ScheduleTemplate], raw: &str) -> Result<Uuid> {
    let matches: Vec<&ScheduleTemplate> = templates
        .iter()
        .filter(|t| t.id.to_string().starts_with(raw))
        .collect();
    match matches.as_slice() {
        [one] => Ok(one.id),
        [] => anyhow::bail!("no template matches '{raw}'"),
        many => anyhow::bail!("'{raw}' is ambiguous ({} templates match)", many.len()),
    }
}

/// Offline template management. The serve process re-reads the store at
/// startup, so edits made here are picked up on the next launch.
fn schedule(action: ScheduleAction) -> Result<()> {
    let store = open_store();
    let mut templates = store.load();

    match action {
        ScheduleAction::List => {
            if templates.is_empty() {
                println!("No schedule templates yet. Try `localboost schedule add`.");
                return Ok(());
            }
            println!("📅 {} template(s):", templates.len());
            for t in &templates {
                let state = if t.active { "active" } else { "paused" };
                let platforms: Vec<&str> = t.platforms.iter().map(|p| p.as_str()).collect();
                println!(
                    "   {}  {:<24} {:<18} {:<8} [{}]",
                    t.id,
                    t.name,
                    cadence(&t.frequency, &t.time_of_day),
                    state,
                    platforms.join(",")
                );
            }
        }
        ScheduleAction::Add {
            name,
            content,
            frequency,
            day_of_week,
            time,
            platforms,
            category,
            paused,
        } => {
            let frequency = match frequency.as_str() {
                "daily" => Frequency::Daily,
                "weekly" => Frequency::Weekly { day_of_week },
                other => anyhow::bail!("unknown frequency '{other}' (use daily or weekly)"),
            };
            let platforms = platforms
                .split(',')
                .map(|s| s.trim().parse::<Platform>())
                .collect::<localboost_core::error::Result<Vec<_>>>()?;
            let category = match category.as_str() {
                "promotional" => PostCategory::Promotional,
                "educational" => PostCategory::Educational,
                "engagement" => PostCategory::Engagement,
                "seasonal" => PostCategory::Seasonal,
                other => anyhow::bail!("unknown category '{other}'"),
            };
            if name.trim().is_empty() {
                anyhow::bail!("template name must not be empty");
            }
            if content.trim().is_empty() {
                anyhow::bail!("content template must not be empty");
            }

            let mut template =
                ScheduleTemplate::new(&name, &content, frequency, &time, platforms, category);
            template.active = !paused;
            template.validate()?;

            templates.push(template.clone());
            store.save(&templates)?;
            println!("✅ Created '{}' ({})", template.name, template.id);
            if template.active {
                println!("   It will be armed the next time `localboost serve` starts.");
            }
        }
        ScheduleAction::Rm { id } => {
            let id = find_template(&templates, &id)?;
            templates.retain(|t| t.id != id);
            store.save(&templates)?;
            println!("🗑️ Removed {id}");
        }
        ScheduleAction::Pause { id } => {
            let id = find_template(&templates, &id)?;
            for t in &mut templates {
                if t.id == id {
                    t.active = false;
                }
            }
            store.save(&templates)?;
            println!("⏸️ Paused {id}");
        }
        ScheduleAction::Resume { id } => {
            let id = find_template(&templates, &id)?;
            for t in &mut templates {
                if t.id == id {
                    t.active = true;
                }
            }
            store.save(&templates)?;
            println!("▶️ Resumed {id}");
        }
    }
    Ok(())
}

/// One sync pass against every configured channel, printed per platform.
async fn sync_once(config: LocalBoostConfig) -> Result<()> {
    let channels = ChannelRegistry::from_config(&config.channels);
    let aggregator = SyncAggregator::new(
        channels,
        Duration::from_secs(config.sync.fetch_timeout_secs),
    );

    println!("📊 Fetching channel stats...");
    let snapshot = aggregator.tick().await;

    for platform in Platform::ALL {
        match snapshot.channels.get(&platform) {
            Some(ChannelReport::Stats(s)) => println!(
                "   ✅ {:<16} {} followers, {} impressions, {} engagements",
                platform.as_str(),
                s.followers,
                s.impressions,
                s.engagements
            ),
            Some(ChannelReport::Error(e)) => {
                println!("   ❌ {:<16} {}", platform.as_str(), e.reason)
            }
            _ => println!("   ⚪ {:<16} not configured", platform.as_str()),
        }
    }
    println!(
        "   {} ok / {} failed / {} unconfigured",
        snapshot.stats_count(),
        snapshot.error_count(),
        snapshot.unconfigured_count()
    );
    Ok(())
}

/// Run one firing of a stored template immediately, outside its recurrence.
async fn fire_once(config: LocalBoostConfig, raw_id: &str) -> Result<()> {
    let templates = open_store().load();
    let id = find_template(&templates, raw_id)?;
    let template = templates
        .iter()
        .find(|t| t.id == id)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("no template matches '{raw_id}'"))?;

    let keywords = Arc::new(KeywordStore::open(
        &KeywordStore::default_dir(),
        config.business.serving_areas.clone(),
    ));
    let history = Arc::new(tokio::sync::Mutex::new(PostHistory::open_default()?));
    let generator = localboost_generator::create_generator(&config)?;
    let channels = ChannelRegistry::from_config(&config.channels);

    let pipeline = PublishPipeline::new(
        generator,
        channels,
        keywords,
        history,
        config.business.profile_id.clone(),
        Duration::from_secs(config.scheduler.generation_timeout_secs),
        Duration::from_secs(config.scheduler.publish_timeout_secs),
    );

    println!("🚀 Firing '{}'...", template.name);
    let post = pipeline.execute(&template, Utc::now()).await;

    match &post.failure_reason {
        None => {
            println!("✅ Published to {} platform(s):", post.receipts().len());
            for receipt in post.receipts() {
                match &receipt.url {
                    Some(url) => println!("   {} → {}", receipt.platform.as_str(), url),
                    None => println!("   {} → {}", receipt.platform.as_str(), receipt.remote_id),
                }
            }
        }
        Some(reason) => println!("❌ Firing failed: {reason}"),
    }
    Ok(())
}

/// Show discovered keyword clusters for each serving area.
fn keywords(config: LocalBoostConfig) -> Result<()> {
    let store = KeywordStore::open(
        &KeywordStore::default_dir(),
        config.business.serving_areas.clone(),
    );

    if store.areas().is_empty() {
        println!("No serving areas configured. Add [[business.serving_areas]] to the config.");
        return Ok(());
    }

    let clusters = store.all_clusters();
    println!("🔑 {} serving area(s):", store.areas().len());
    for area in store.areas() {
        match clusters.get(&area.name) {
            Some(cluster) => {
                println!("   {} — \"{}\"", area.name, cluster.primary_keyword);
                if !cluster.related_keywords.is_empty() {
                    println!("      related: {}", cluster.related_keywords.join(", "));
                }
                if !cluster.content_themes.is_empty() {
                    println!("      themes:  {}", cluster.content_themes.join(", "));
                }
            }
            None => println!("   {} — no cluster discovered yet", area.name),
        }
    }
    Ok(())
}
