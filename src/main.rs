use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use nike_sites::config::Settings;
use nike_sites::fetch;
use nike_sites::model::{Site, SitePatch, SiteView};
use nike_sites::service::{self, LoadOutcome, SiteFilter};
use nike_sites::store::{self, StorageAdapter};

#[derive(Parser)]
#[command(name = "nike_sites", about = "Nike missile site harvester and store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the source page and show what would be extracted
    Harvest {
        /// Records to print
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
        /// Print records as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Fetch and replace the store contents
    Import,
    /// Fetch and import only if the store is empty
    Load,
    /// Sites table
    List {
        /// Filter by state (case-insensitive substring)
        #[arg(short, long)]
        state: Option<String>,
        /// Filter by site type (exact)
        #[arg(short = 't', long)]
        site_type: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Print one site as JSON
    Show { id: i64 },
    /// Change fields of one site
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        site_type: Option<String>,
        #[arg(long)]
        status: Option<String>,
    },
    /// Remove one site
    Delete { id: i64 },
    /// Remove every site
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::from_env().context("invalid configuration")?;

    let result = match cli.command {
        Commands::Harvest { limit, json } => {
            let harvest = fetch::fetch_and_harvest(&settings.fetch).await?;
            let r = &harvest.report;
            println!(
                "Extracted {} sites from {} tables ({} rejected), {} rows skipped.",
                harvest.sites.len(),
                r.tables_seen,
                r.tables_rejected,
                r.rows_skipped()
            );

            if json {
                let views: Vec<_> = harvest
                    .sites
                    .iter()
                    .take(limit)
                    .cloned()
                    .zip(1..)
                    .map(|(record, id)| SiteView::from(&Site::new(id, record)))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&views)?);
            } else {
                println!("\n--- Per state ---");
                let mut counts = std::collections::BTreeMap::<&str, usize>::new();
                for s in &harvest.sites {
                    *counts.entry(s.state.as_str()).or_default() += 1;
                }
                for (state, n) in &counts {
                    println!("  {:<24} {:>4}", truncate(state, 24), n);
                }
                println!();
                print_header();
                for (i, s) in harvest.sites.iter().take(limit).enumerate() {
                    print_row(i as i64 + 1, &s.site_code, &s.name, &s.state, s.latitude, s.longitude, &s.status);
                }
            }
            Ok(())
        }
        Commands::Import => {
            let harvest = fetch::fetch_and_harvest(&settings.fetch).await?;
            if harvest.sites.is_empty() {
                bail!(
                    "no sites extracted from {} ({} tables seen); store left untouched",
                    settings.fetch.url,
                    harvest.report.tables_seen
                );
            }
            let store = open(&settings).await?;
            let count = store
                .import_sites(&harvest.sites)
                .await
                .context("import failed")?;
            println!("Imported {} sites into the {} store.", count, store.backend());
            Ok(())
        }
        Commands::Load => {
            let store = store::open_store(&settings)?;
            match service::ensure_loaded(store.as_ref(), &settings.fetch).await? {
                LoadOutcome::AlreadyLoaded { existing } => {
                    println!("Store already holds {} sites; nothing to do.", existing)
                }
                LoadOutcome::Imported { count, report } => println!(
                    "Imported {} sites ({} rows skipped).",
                    count,
                    report.rows_skipped()
                ),
                LoadOutcome::NothingHarvested { .. } => {
                    println!("No sites extracted; store left empty.")
                }
            }
            Ok(())
        }
        Commands::List {
            state,
            site_type,
            limit,
        } => {
            let store = open(&settings).await?;
            let filter = SiteFilter { state, site_type };
            let sites = filter.apply(store.get_all().await?);
            if sites.is_empty() {
                println!("No sites found. Run 'import' first or relax the filters.");
                return Ok(());
            }

            print_header();
            for s in sites.iter().take(limit) {
                let r = &s.record;
                print_row(s.id, &r.site_code, &r.name, &r.state, r.latitude, r.longitude, &r.status);
            }
            let states = service::count_by_state(&sites).len();
            println!("\n{} sites in {} states", sites.len(), states);
            Ok(())
        }
        Commands::Show { id } => {
            let store = open(&settings).await?;
            let site = store
                .get_by_id(id)
                .await?
                .with_context(|| format!("no site with id {}", id))?;
            println!("{}", serde_json::to_string_pretty(&SiteView::from(&site))?);
            Ok(())
        }
        Commands::Update {
            id,
            name,
            description,
            site_type,
            status,
        } => {
            let patch = SitePatch {
                name,
                description,
                site_type,
                status,
                ..Default::default()
            };
            if patch.is_empty() {
                bail!("nothing to update: pass at least one field");
            }
            let store = open(&settings).await?;
            if !store.update(id, &patch).await? {
                bail!("no site with id {}", id);
            }
            println!("Updated site {}.", id);
            Ok(())
        }
        Commands::Delete { id } => {
            let store = open(&settings).await?;
            if !store.delete(id).await? {
                bail!("no site with id {}", id);
            }
            println!("Deleted site {}.", id);
            Ok(())
        }
        Commands::Clear => {
            let store = open(&settings).await?;
            let removed = service::clear_all(store.as_ref()).await?;
            println!("Deleted {} sites.", removed);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn open(settings: &Settings) -> anyhow::Result<Box<dyn StorageAdapter>> {
    let store = store::open_store(settings)?;
    store
        .initialize()
        .await
        .with_context(|| format!("could not initialize {} store", store.backend()))?;
    Ok(store)
}

fn print_header() {
    println!(
        "{:>4} | {:<8} | {:<28} | {:<16} | {:>9} | {:>10} | {:<12}",
        "#", "Code", "Name", "State", "Lat", "Lon", "Status"
    );
    println!("{}", "-".repeat(104));
}

fn print_row(n: i64, code: &str, name: &str, state: &str, lat: f64, lon: f64, status: &str) {
    println!("{}", format_row(n, code, name, state, lat, lon, status));
}

fn format_row(n: i64, code: &str, name: &str, state: &str, lat: f64, lon: f64, status: &str) -> String {
    format!(
        "{:>4} | {:<8} | {:<28} | {:<16} | {:>9.4} | {:>10.4} | {:<12}",
        n,
        truncate(code, 8),
        truncate(name, 28),
        truncate(state, 16),
        lat,
        lon,
        truncate(status, 12)
    )
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
