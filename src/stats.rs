use chrono::{DateTime, Utc};

/// Counters kept for one batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    Processed,
    Accepted,
    NoSuchPage,
    NoImage,
    NoDatableImage,
    NoClaims,
    NoBirthDate,
    NoSex,
    MultipleDates,
    DateDescDiscrepancy,
    MalformedClaims,
    ProviderErrors,
}

impl Counter {
    pub const ALL: [Counter; 12] = [
        Counter::Processed,
        Counter::Accepted,
        Counter::NoSuchPage,
        Counter::NoImage,
        Counter::NoDatableImage,
        Counter::NoClaims,
        Counter::NoBirthDate,
        Counter::NoSex,
        Counter::MultipleDates,
        Counter::DateDescDiscrepancy,
        Counter::MalformedClaims,
        Counter::ProviderErrors,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Counter::Processed => "processed",
            Counter::Accepted => "accepted",
            Counter::NoSuchPage => "no_such_page",
            Counter::NoImage => "no_image",
            Counter::NoDatableImage => "no_datable_image",
            Counter::NoClaims => "no_claims",
            Counter::NoBirthDate => "no_birth_date",
            Counter::NoSex => "no_sex",
            Counter::MultipleDates => "multiple_dates",
            Counter::DateDescDiscrepancy => "date_desc_discrepancy",
            Counter::MalformedClaims => "malformed_claims",
            Counter::ProviderErrors => "provider_errors",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Additive tallies for one run. A new run starts from zero; nothing is
/// ever decremented.
#[derive(Debug, Clone)]
pub struct RunStatistics {
    run_id: String,
    started_at: DateTime<Utc>,
    counts: [u64; Counter::ALL.len()],
}

impl RunStatistics {
    pub fn new_run() -> Self {
        let started_at = Utc::now();
        RunStatistics {
            run_id: format!("run-{}", started_at.format("%Y%m%dT%H%M%S%.3f")),
            started_at,
            counts: [0; Counter::ALL.len()],
        }
    }

    pub fn record(&mut self, counter: Counter) {
        self.counts[counter.index()] += 1;
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.counts[counter.index()]
    }

    /// Every counter by name, in declaration order.
    pub fn snapshot(&self) -> Vec<(&'static str, u64)> {
        Counter::ALL
            .iter()
            .map(|c| (c.name(), self.get(*c)))
            .collect()
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn print(&self) {
        for (name, count) in self.snapshot() {
            println!("  {:<22} {:>7}", name, count);
        }
    }
}
