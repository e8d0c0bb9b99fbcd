use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::record::Record;
use crate::stats::RunStatistics;

pub fn connect(path: &str) -> Result<Connection> {
    if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS people (
            id                INTEGER PRIMARY KEY NOT NULL,
            pageid            INTEGER UNIQUE NOT NULL,
            pagename          TEXT NOT NULL,
            pagelink          TEXT NOT NULL,
            sex               TEXT NOT NULL,
            birthdate         TEXT NOT NULL,
            deathdate         TEXT,
            imagename         TEXT NOT NULL,
            imagesite         TEXT NOT NULL CHECK(imagesite IN ('local','shared')),
            imagelink         TEXT NOT NULL,
            imagedescription  TEXT,
            imagedate         TEXT NOT NULL,
            created_at        TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS runs (
            run_id      TEXT PRIMARY KEY,
            category    TEXT NOT NULL,
            started_at  TEXT NOT NULL,
            finished_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS run_counters (
            run_id   TEXT NOT NULL REFERENCES runs(run_id),
            counter  TEXT NOT NULL,
            count    INTEGER NOT NULL,
            UNIQUE(run_id, counter)
        );
        CREATE INDEX IF NOT EXISTS idx_run_counters_run ON run_counters(run_id);
        ",
    )?;
    Ok(())
}

// ── People ──

/// Store one record. Returns `false` if the page id is already present.
pub fn insert_person(conn: &Connection, r: &Record) -> Result<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO people
         (pageid, pagename, pagelink, sex, birthdate, deathdate,
          imagename, imagesite, imagelink, imagedescription, imagedate)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        rusqlite::params![
            r.subject.page_id,
            r.subject.title,
            r.subject.permalink,
            r.sex,
            r.birth_date,
            r.death_date,
            r.image.title,
            r.image.site.as_str(),
            r.image.url,
            r.image_description,
            r.image_year,
        ],
    )?;
    Ok(changed > 0)
}

pub fn count_people(conn: &Connection) -> Result<usize> {
    Ok(conn.query_row("SELECT COUNT(*) FROM people", [], |r| r.get(0))?)
}

// ── Runs ──

pub fn save_run(
    conn: &Connection,
    stats: &RunStatistics,
    category: &str,
    finished_at: DateTime<Utc>,
) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT OR REPLACE INTO runs (run_id, category, started_at, finished_at)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            stats.run_id(),
            category,
            stats.started_at().to_rfc3339(),
            finished_at.to_rfc3339(),
        ],
    )?;
    {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO run_counters (run_id, counter, count) VALUES (?1, ?2, ?3)",
        )?;
        for (name, count) in stats.snapshot() {
            stmt.execute(rusqlite::params![stats.run_id(), name, count as i64])?;
        }
    }
    tx.commit()?;
    Ok(())
}

pub struct RunRow {
    pub run_id: String,
    pub category: String,
    pub started_at: String,
    pub counters: Vec<(String, i64)>,
}

impl RunRow {
    pub fn counter(&self, name: &str) -> i64 {
        self.counters
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| *c)
            .unwrap_or(0)
    }
}

/// Most recent runs first.
pub fn fetch_runs(conn: &Connection, limit: usize) -> Result<Vec<RunRow>> {
    let mut stmt = conn.prepare(
        "SELECT run_id, category, started_at FROM runs ORDER BY started_at DESC LIMIT ?1",
    )?;
    let mut runs = stmt
        .query_map([limit as i64], |row| {
            Ok(RunRow {
                run_id: row.get(0)?,
                category: row.get(1)?,
                started_at: row.get(2)?,
                counters: Vec::new(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut counters =
        conn.prepare("SELECT counter, count FROM run_counters WHERE run_id = ?1 ORDER BY rowid")?;
    for run in &mut runs {
        run.counters = counters
            .query_map([&run.run_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
    }
    Ok(runs)
}

// ── Stats ──

pub struct Stats {
    pub people: usize,
    pub shared_images: usize,
    pub with_death_date: usize,
    pub runs: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let people = count_people(conn)?;
    let shared_images: usize = conn.query_row(
        "SELECT COUNT(*) FROM people WHERE imagesite = 'shared'",
        [],
        |r| r.get(0),
    )?;
    let with_death_date: usize = conn.query_row(
        "SELECT COUNT(*) FROM people WHERE deathdate IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let runs: usize = conn.query_row("SELECT COUNT(*) FROM runs", [], |r| r.get(0))?;
    Ok(Stats {
        people,
        shared_images,
        with_death_date,
        runs,
    })
}
