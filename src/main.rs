mod claims;
mod config;
mod csv;
mod db;
mod extract;
mod parser;
mod pipeline;
mod provider;
mod record;
mod stats;
mod survey;

use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::provider::category::{category_title, Sampling, DEFAULT_SORTKEY};
use crate::provider::{MediaWikiProvider, SubjectRef};
use crate::record::{Extraction, RECORD_HEADER};
use crate::stats::{Counter, RunStatistics};

#[derive(Parser)]
#[command(name = "wikipeople", about = "Harvest person facts from Wikipedia, Commons and Wikidata")]
struct Cli {
    /// SQLite database path (overrides config)
    #[arg(long, global = true)]
    db: Option<String>,
    /// Output directory for CSV files (overrides config)
    #[arg(long, global = true)]
    csv_dir: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract one person and print the result
    Person {
        /// Article title, or page id with --id
        title: String,
        /// Treat the argument as a numeric page id
        #[arg(long)]
        id: bool,
    },
    /// Run the extraction pipeline over a category sample
    Harvest {
        /// Category name, with or without the "Category:" prefix
        #[arg(short, long, default_value = "Living people")]
        category: String,
        /// Members taken per sort-key prefix
        #[arg(short = 's', long, default_value = "50")]
        sample_size: usize,
        /// One sort-key prefix per character
        #[arg(long, default_value = DEFAULT_SORTKEY)]
        sortkey: String,
        /// Skip members whose title contains this text
        #[arg(short, long)]
        exclude: Option<String>,
        /// Max subjects to process
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Count how many category members have a representative image
    Survey {
        /// Category to survey (repeatable)
        #[arg(short, long)]
        category: Vec<String>,
        /// Survey "<year> deaths" categories, e.g. 2000..2020
        #[arg(long)]
        deaths: Option<String>,
        /// Members taken per sort-key prefix
        #[arg(short = 's', long, default_value = "50")]
        sample_size: usize,
    },
    /// Show stored people and recent run counters
    Stats {
        /// Number of runs to compare
        #[arg(short = 'n', long, default_value = "10")]
        runs: usize,
    },
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

    let mut settings = config::load()?;
    if let Some(db) = cli.db {
        settings.db_path = db;
    }
    if let Some(dir) = cli.csv_dir {
        settings.csv_dir = dir;
    }

    let result = match cli.command {
        Commands::Person { title, id } => {
            let subject = if id {
                SubjectRef::PageId(title.parse().with_context(|| format!("Bad page id {:?}", title))?)
            } else {
                SubjectRef::Title(title.clone())
            };
            let provider = MediaWikiProvider::new(&settings)?;
            let mut stats = RunStatistics::new_run();
            let outcome = pipeline::process_subject(&provider, &subject, &mut stats)
                .await
                .with_context(|| format!("Failed to process {}", title))?;
            match outcome {
                Extraction::Accepted(r) => {
                    for (name, value) in RECORD_HEADER.iter().zip(r.to_row()) {
                        println!("{:<17} {}", name, value);
                    }
                    println!("{:<17} {}", "Page", r.subject.permalink);
                    println!("{:<17} {} ({})", "ImageUrl", r.image.url, r.image.site.as_str());
                }
                Extraction::Rejected(reason) => println!("{}: rejected, {}", title, reason),
            }
            for counter in [Counter::MultipleDates, Counter::DateDescDiscrepancy, Counter::MalformedClaims] {
                if stats.get(counter) > 0 {
                    println!("note: {}", counter.name());
                }
            }
            Ok(())
        }
        Commands::Harvest {
            category,
            sample_size,
            sortkey,
            exclude,
            limit,
        } => {
            let provider = MediaWikiProvider::new(&settings)?;
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;

            let category = category_title(&category);
            if let Some(size) = provider.category_size(&category).await? {
                info!("{} has {} pages", category, size);
            }
            let sampling = Sampling {
                sample_size,
                sortkey,
                exclude,
            };
            info!("Sampling up to {} members", sampling.max_members());
            let mut sample = provider.sample_category(&category, &sampling).await?;
            if let Some(n) = limit {
                sample.members.truncate(n);
            }
            if sample.members.is_empty() {
                println!("No members sampled from {}.", category);
                return Ok(());
            }

            let dir = Path::new(&settings.csv_dir).join("records");
            let mut out = csv::create(&dir, &category, &RECORD_HEADER)?;
            println!("Harvesting {} pages from {}...", sample.members.len(), category);
            let stats = pipeline::run_batch(&provider, &sample.members, &conn, &mut out).await?;
            db::save_run(&conn, &stats, &category, Utc::now())?;

            println!("Run {} ({} excluded by filter):", stats.run_id(), sample.excluded);
            stats.print();
            Ok(())
        }
        Commands::Survey {
            category,
            deaths,
            sample_size,
        } => {
            let provider = MediaWikiProvider::new(&settings)?;
            let mut targets: Vec<(String, Option<String>)> =
                category.into_iter().map(|c| (c, None)).collect();
            if let Some(range) = deaths {
                targets.extend(
                    survey::deaths_categories(&range)?
                        .into_iter()
                        .map(|(c, year)| (c, Some(year))),
                );
            }
            if targets.is_empty() {
                targets.push(("Living people".to_string(), None));
            }

            let dir = Path::new(&settings.csv_dir);
            for (name, exclude) in targets {
                let started = Instant::now();
                let sampling = Sampling {
                    sample_size,
                    exclude,
                    ..Sampling::default()
                };
                let sample = provider.sample_category(&name, &sampling).await?;
                let rows = survey::check_pages(&provider, &sample.members).await;
                let s = survey::write_survey(dir, &name, &rows, sample.excluded, started.elapsed())?;
                println!(
                    "{:<24} {:>5}/{:<5} {:>6.2}%  ({} excluded, {})",
                    truncate(&s.category, 24),
                    s.has_image,
                    s.total,
                    s.percent(),
                    s.excluded,
                    format_duration(s.elapsed)
                );
            }
            Ok(())
        }
        Commands::Stats { runs } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("People:        {}", s.people);
            println!("Shared images: {}", s.shared_images);
            println!("Deceased:      {}", s.with_death_date);
            println!("Runs:          {}", s.runs);

            let rows = db::fetch_runs(&conn, runs)?;
            if rows.is_empty() {
                return Ok(());
            }

            let columns = [
                ("seen", Counter::Processed),
                ("kept", Counter::Accepted),
                ("no_img", Counter::NoImage),
                ("no_year", Counter::NoDatableImage),
                ("no_item", Counter::NoClaims),
                ("no_birth", Counter::NoBirthDate),
                ("no_sex", Counter::NoSex),
                ("errors", Counter::ProviderErrors),
            ];
            println!();
            print!("{:<24} | {:<19}", "Category", "Started");
            for (label, _) in columns {
                print!(" | {:>8}", label);
            }
            println!();
            println!("{}", "-".repeat(46 + columns.len() * 11));
            for r in &rows {
                print!(
                    "{:<24} | {:<19}",
                    truncate(r.category.trim_start_matches("Category:"), 21),
                    truncate(&r.started_at, 16)
                );
                for (_, c) in columns {
                    print!(" | {:>8}", r.counter(c.name()));
                }
                println!();
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
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
