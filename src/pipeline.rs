use std::io::Write;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::csv::CsvWriter;
use crate::db;
use crate::extract;
use crate::extract::claims::ClaimError;
use crate::parser::parse_information_block;
use crate::provider::{ImageHandle, SubjectProvider, SubjectRef};
use crate::record::{Extraction, ImageReference, Record, Rejection, Site, Subject};
use crate::stats::{Counter, RunStatistics};

/// Run the extractors for one subject, in fixed order, stopping at the first
/// missing required field.
///
/// Provider failures are returned as errors; everything about the data itself
/// ends up in the [`Extraction`] and in `stats`.
pub async fn process_subject<P: SubjectProvider>(
    provider: &P,
    subject: &SubjectRef,
    stats: &mut RunStatistics,
) -> Result<Extraction, P::Error> {
    stats.record(Counter::Processed);

    let Some(page) = provider.fetch_page(subject).await? else {
        return Ok(reject(stats, Rejection::NoSuchPage));
    };
    let Some(image) = provider.get_representative_image(&page).await? else {
        return Ok(reject(stats, Rejection::NoImage));
    };

    let site = if provider.image_exists_on_site(&image, Site::Local).await? {
        Site::Local
    } else {
        Site::Shared
    };
    let image = ImageHandle { site, ..image };
    let image_url = provider.get_file_url(&image).await?;
    let permalink = provider.get_permalink(&page).await?;

    let markup = provider.get_raw_markup(&image).await?;
    let block = parse_information_block(&markup);
    let image_year = block
        .as_ref()
        .map(extract::extract_image_year)
        .unwrap_or_default();
    image_year.tally(stats);
    let Some(year) = image_year.year().map(str::to_string) else {
        debug!("{}: no datable image ({})", page.title, image.title);
        return Ok(reject(stats, Rejection::NoDatableImage));
    };
    let description = block
        .as_ref()
        .and_then(extract::extract_description)
        .map(str::to_string);

    let claims = match provider.get_knowledge_base_item(&page).await? {
        Some(claims) if !claims.is_empty() => claims,
        _ => return Ok(reject(stats, Rejection::NoClaims)),
    };

    let birth_date = required(
        &page.title,
        extract::extract_birth_date(&claims),
        Counter::NoBirthDate,
        stats,
    );
    let sex = required(&page.title, extract::extract_sex(&claims), Counter::NoSex, stats);
    let death_date = optional(&page.title, extract::extract_death_date(&claims), stats);

    // Both extractors have run, so both counters are already up to date.
    let (birth_date, sex) = match (birth_date, sex) {
        (Some(birth_date), Some(sex)) => (birth_date, sex),
        (None, _) => return Ok(Extraction::Rejected(Rejection::NoBirthDate)),
        (_, None) => return Ok(Extraction::Rejected(Rejection::NoSex)),
    };

    stats.record(Counter::Accepted);
    Ok(Extraction::Accepted(Record {
        subject: Subject {
            page_id: page.page_id,
            title: page.title,
            permalink,
        },
        sex,
        birth_date,
        death_date,
        image: ImageReference {
            title: image.title,
            site: image.site,
            url: image_url,
        },
        image_description: description,
        image_year: year,
    }))
}

fn reject(stats: &mut RunStatistics, reason: Rejection) -> Extraction {
    stats.record(reason.counter());
    Extraction::Rejected(reason)
}

/// A required claim: absence and malformed data both count against `missing`;
/// malformed data is also logged and counted on its own.
fn required(
    title: &str,
    result: Result<String, ClaimError>,
    missing: Counter,
    stats: &mut RunStatistics,
) -> Option<String> {
    let value = optional(title, result, stats);
    if value.is_none() {
        stats.record(missing);
    }
    value
}

fn optional(title: &str, result: Result<String, ClaimError>, stats: &mut RunStatistics) -> Option<String> {
    match result {
        Ok(value) => Some(value),
        Err(e) if e.is_absence() => {
            debug!("{}: {}", title, e);
            None
        }
        Err(e) => {
            warn!("{}: {}", title, e);
            stats.record(Counter::MalformedClaims);
            None
        }
    }
}

// ── Batch ──

/// Process `subjects` one after another, storing every accepted record in
/// SQLite and CSV. A failing subject is logged and skipped.
pub async fn run_batch<P: SubjectProvider, W: Write>(
    provider: &P,
    subjects: &[SubjectRef],
    conn: &Connection,
    csv: &mut CsvWriter<W>,
) -> Result<RunStatistics> {
    let mut stats = RunStatistics::new_run();
    let mut inserted = 0usize;

    let pb = ProgressBar::new(subjects.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("#>-"),
    );

    for subject in subjects {
        match process_subject(provider, subject, &mut stats).await {
            Ok(Extraction::Accepted(record)) => {
                csv.write_row(&record.to_row())?;
                if db::insert_person(conn, &record)? {
                    inserted += 1;
                } else {
                    debug!("{} already stored", record.subject.title);
                }
            }
            Ok(Extraction::Rejected(reason)) => {
                debug!("{}: rejected, {}", subject, reason);
            }
            Err(e) => {
                warn!("{}: {}", subject, e);
                stats.record(Counter::ProviderErrors);
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    csv.flush()?;
    info!(
        "Processed {} subjects: {} accepted, {} newly stored",
        stats.get(Counter::Processed),
        stats.get(Counter::Accepted),
        inserted
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::{property, ClaimSet, ClaimValue};
    use crate::provider::fake::FakeProvider;
    use crate::record::RECORD_HEADER;

    const PORTRAIT: &str = "{{Information\n|description={{en|1=Jane Doe in her studio}}\n|date=Taken in 1975\n}}";

    fn person_claims(item: &str) -> ClaimSet {
        ClaimSet::new(item)
            .with(
                property::SEX,
                ClaimValue::Item {
                    id: "Q6581072".into(),
                    label: Some("female".into()),
                },
            )
            .with(
                property::BIRTH_DATE,
                ClaimValue::Time {
                    time: "+1931-07-02T00:00:00Z".into(),
                    precision: 11,
                },
            )
    }

    fn title(t: &str) -> SubjectRef {
        SubjectRef::Title(t.to_string())
    }

    async fn run(provider: &FakeProvider, subject: &str) -> (Extraction, RunStatistics) {
        let mut stats = RunStatistics::new_run();
        let outcome = process_subject(provider, &title(subject), &mut stats).await.unwrap();
        (outcome, stats)
    }

    #[tokio::test]
    async fn full_record_from_shared_repository() {
        let provider = FakeProvider::new()
            .page(1, "Jane Doe", Some("Jane Doe 1975.jpg"))
            .markup("Jane Doe 1975.jpg", PORTRAIT)
            .item(1, person_claims("Q1"));

        let (outcome, stats) = run(&provider, "Jane Doe").await;
        let Extraction::Accepted(record) = outcome else {
            panic!("expected a record, got {:?}", outcome);
        };
        assert_eq!(record.subject.page_id, 1);
        assert_eq!(record.image_year, "1975");
        assert_eq!(record.sex, "female");
        assert_eq!(record.birth_date, "1931-07-02");
        assert_eq!(record.death_date, None);
        assert_eq!(record.image.site, Site::Shared);
        assert!(record.image.url.contains("/commons/"));
        assert_eq!(record.image_description.as_deref(), Some("{{en|1=Jane Doe in her studio}}"));
        assert_eq!(stats.get(Counter::Accepted), 1);
        assert_eq!(stats.get(Counter::Processed), 1);
    }

    #[tokio::test]
    async fn local_image_stays_local() {
        let provider = FakeProvider::new()
            .page(2, "John Roe", Some("Roe.png"))
            .local_file("Roe.png")
            .markup("Roe.png", "{{Information|date=1999}}")
            .item(2, person_claims("Q2"));

        let (outcome, _) = run(&provider, "John Roe").await;
        let Extraction::Accepted(record) = outcome else {
            panic!("expected a record");
        };
        assert_eq!(record.image.site, Site::Local);
        assert!(record.image.url.contains("/en/"));
        assert_eq!(record.image_description, None);
    }

    #[tokio::test]
    async fn missing_page() {
        let provider = FakeProvider::new();
        let (outcome, stats) = run(&provider, "Nobody").await;
        assert_eq!(outcome, Extraction::Rejected(Rejection::NoSuchPage));
        assert_eq!(stats.get(Counter::NoSuchPage), 1);
        assert_eq!(provider.calls("get_representative_image"), 0);
    }

    #[tokio::test]
    async fn no_image_skips_knowledge_base() {
        let provider = FakeProvider::new()
            .page(3, "No Picture", None)
            .item(3, person_claims("Q3"));

        let (outcome, stats) = run(&provider, "No Picture").await;
        assert_eq!(outcome, Extraction::Rejected(Rejection::NoImage));
        assert_eq!(stats.get(Counter::NoImage), 1);
        assert_eq!(provider.calls("get_knowledge_base_item"), 0);
        assert_eq!(provider.calls("get_raw_markup"), 0);
    }

    #[tokio::test]
    async fn undatable_image() {
        let provider = FakeProvider::new()
            .page(4, "Undated", Some("U.jpg"))
            .markup("U.jpg", "{{Information|date=2008-05-04 (original upload date)|description=Portrait}}")
            .item(4, person_claims("Q4"));

        let (outcome, stats) = run(&provider, "Undated").await;
        assert_eq!(outcome, Extraction::Rejected(Rejection::NoDatableImage));
        assert_eq!(stats.get(Counter::NoDatableImage), 1);
        assert_eq!(provider.calls("get_knowledge_base_item"), 0);
    }

    #[tokio::test]
    async fn missing_information_block_is_undatable() {
        let provider = FakeProvider::new()
            .page(5, "Fair Use", Some("F.jpg"))
            .markup("F.jpg", "{{Non-free biog-pic}}");

        let (outcome, _) = run(&provider, "Fair Use").await;
        assert_eq!(outcome, Extraction::Rejected(Rejection::NoDatableImage));
    }

    #[tokio::test]
    async fn empty_item_is_no_claims() {
        let provider = FakeProvider::new()
            .page(6, "Empty Item", Some("E.jpg"))
            .markup("E.jpg", PORTRAIT)
            .item(6, ClaimSet::new("Q6"));

        let (outcome, stats) = run(&provider, "Empty Item").await;
        assert_eq!(outcome, Extraction::Rejected(Rejection::NoClaims));
        assert_eq!(stats.get(Counter::NoClaims), 1);
        assert_eq!(stats.get(Counter::NoBirthDate), 0);
        assert_eq!(stats.get(Counter::NoSex), 0);
    }

    #[tokio::test]
    async fn absent_item_is_no_claims() {
        let provider = FakeProvider::new()
            .page(7, "No Item", Some("N.jpg"))
            .markup("N.jpg", PORTRAIT);

        let (outcome, _) = run(&provider, "No Item").await;
        assert_eq!(outcome, Extraction::Rejected(Rejection::NoClaims));
    }

    #[tokio::test]
    async fn missing_birth_date_and_sex_both_counted() {
        let claims = ClaimSet::new("Q8").with(
            property::DEATH_DATE,
            ClaimValue::Time {
                time: "+2001-01-01T00:00:00Z".into(),
                precision: 11,
            },
        );
        let provider = FakeProvider::new()
            .page(8, "Sparse", Some("S.jpg"))
            .markup("S.jpg", PORTRAIT)
            .item(8, claims);

        let (outcome, stats) = run(&provider, "Sparse").await;
        assert_eq!(outcome, Extraction::Rejected(Rejection::NoBirthDate));
        assert_eq!(stats.get(Counter::NoBirthDate), 1);
        assert_eq!(stats.get(Counter::NoSex), 1);
        assert_eq!(stats.get(Counter::Accepted), 0);
    }

    #[tokio::test]
    async fn missing_sex() {
        let claims = ClaimSet::new("Q9").with(
            property::BIRTH_DATE,
            ClaimValue::Time {
                time: "+1950-00-00T00:00:00Z".into(),
                precision: 9,
            },
        );
        let provider = FakeProvider::new()
            .page(9, "Sexless", Some("X.jpg"))
            .markup("X.jpg", PORTRAIT)
            .item(9, claims);

        let (outcome, stats) = run(&provider, "Sexless").await;
        assert_eq!(outcome, Extraction::Rejected(Rejection::NoSex));
        assert_eq!(stats.get(Counter::NoSex), 1);
        assert_eq!(stats.get(Counter::NoBirthDate), 0);
    }

    #[tokio::test]
    async fn malformed_claim_counted_separately() {
        let claims = person_claims("Q10").with(property::DEATH_DATE, ClaimValue::Other("string".into()));
        let provider = FakeProvider::new()
            .page(10, "Odd Death", Some("O.jpg"))
            .markup("O.jpg", PORTRAIT)
            .item(10, claims);

        let (outcome, stats) = run(&provider, "Odd Death").await;
        assert!(matches!(outcome, Extraction::Accepted(ref r) if r.death_date.is_none()));
        assert_eq!(stats.get(Counter::MalformedClaims), 1);
    }

    #[tokio::test]
    async fn discrepancy_counted_once() {
        let provider = FakeProvider::new()
            .page(11, "Conflicted", Some("C.jpg"))
            .markup("C.jpg", "{{Information|date=1980|description=Rally, 1981}}")
            .item(11, person_claims("Q11"));

        let (outcome, stats) = run(&provider, "Conflicted").await;
        assert!(matches!(outcome, Extraction::Accepted(ref r) if r.image_year == "1980"));
        assert_eq!(stats.get(Counter::DateDescDiscrepancy), 1);
    }

    #[tokio::test]
    async fn hostile_markup_does_not_stop_batch() {
        let provider = FakeProvider::new()
            .page(12, "Nested", Some("Deep.jpg"))
            .markup("Deep.jpg", &"{{a ".repeat(20_000))
            .item(12, person_claims("Q12"))
            .page(13, "Unbalanced", Some("Link.jpg"))
            .markup("Link.jpg", "{{Information\n|description=Portrait of [[w:Jane Doe|Jane Doe\n|date=1975\n}}")
            .item(13, person_claims("Q13"));

        let (outcome, _) = run(&provider, "Nested").await;
        assert_eq!(outcome, Extraction::Rejected(Rejection::NoDatableImage));

        let (outcome, _) = run(&provider, "Unbalanced").await;
        assert!(matches!(outcome, Extraction::Accepted(ref r) if r.image_year == "1975"));
    }

    #[tokio::test]
    async fn batch_stores_and_continues_after_failure() {
        let provider = FakeProvider::new()
            .page(1, "Jane Doe", Some("J.jpg"))
            .markup("J.jpg", PORTRAIT)
            .item(1, person_claims("Q1"))
            .page(3, "No Picture", None)
            .failing("Broken");

        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        let mut csv = CsvWriter::new(Vec::new(), &RECORD_HEADER).unwrap();
        let subjects = vec![title("Broken"), title("Jane Doe"), title("No Picture"), title("Jane Doe")];

        let stats = run_batch(&provider, &subjects, &conn, &mut csv).await.unwrap();
        assert_eq!(stats.get(Counter::Processed), 4);
        assert_eq!(stats.get(Counter::ProviderErrors), 1);
        assert_eq!(stats.get(Counter::Accepted), 2);
        assert_eq!(stats.get(Counter::NoImage), 1);
        assert_eq!(db::count_people(&conn).unwrap(), 1);

        let text = String::from_utf8(csv.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], RECORD_HEADER.join(","));
        assert!(lines[1].starts_with("Jane Doe,female,1931-07-02,NoDeathDate,J.jpg,"));
    }
}
