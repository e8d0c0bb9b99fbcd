use chrono::NaiveDate;
use thiserror::Error;

use crate::claims::{property, ClaimSet, ClaimValue};

/// Why a knowledge-base field could not be read.
///
/// `NoClaims`, `MissingProperty` and `NoTarget` mean the data is simply not
/// there. `MissingLabel` and `Malformed` mean it is there but unusable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClaimError {
    #[error("item has no claims")]
    NoClaims,

    #[error("P{0} not present")]
    MissingProperty(u32),

    #[error("P{0} has no target value")]
    NoTarget(u32),

    #[error("{0} has no label in the requested language")]
    MissingLabel(String),

    #[error("malformed P{property}: {reason}")]
    Malformed { property: u32, reason: String },
}

impl ClaimError {
    pub fn is_absence(&self) -> bool {
        matches!(
            self,
            ClaimError::NoClaims | ClaimError::MissingProperty(_) | ClaimError::NoTarget(_)
        )
    }
}

/// Display label of the first P21 target.
pub fn extract_sex(claims: &ClaimSet) -> Result<String, ClaimError> {
    match first_target(claims, property::SEX)? {
        ClaimValue::Item { label: Some(label), .. } => Ok(label.clone()),
        ClaimValue::Item { id, label: None } => Err(ClaimError::MissingLabel(id.clone())),
        other => Err(unexpected(property::SEX, "item", other)),
    }
}

/// First P569 value as `YYYY-MM-DD`.
pub fn extract_birth_date(claims: &ClaimSet) -> Result<String, ClaimError> {
    extract_date(claims, property::BIRTH_DATE)
}

/// First P570 value as `YYYY-MM-DD`.
pub fn extract_death_date(claims: &ClaimSet) -> Result<String, ClaimError> {
    extract_date(claims, property::DEATH_DATE)
}

fn extract_date(claims: &ClaimSet, prop: u32) -> Result<String, ClaimError> {
    match first_target(claims, prop)? {
        ClaimValue::Time { time, precision } => format_time(time, *precision).ok_or_else(|| ClaimError::Malformed {
            property: prop,
            reason: format!("unparseable timestamp {:?}", time),
        }),
        other => Err(unexpected(prop, "time", other)),
    }
}

fn first_target(claims: &ClaimSet, prop: u32) -> Result<&ClaimValue, ClaimError> {
    if claims.is_empty() {
        return Err(ClaimError::NoClaims);
    }
    match claims.first(prop) {
        None => Err(ClaimError::MissingProperty(prop)),
        Some(ClaimValue::NoTarget) => Err(ClaimError::NoTarget(prop)),
        Some(value) => Ok(value),
    }
}

fn unexpected(prop: u32, wanted: &str, found: &ClaimValue) -> ClaimError {
    let found = match found {
        ClaimValue::Item { .. } => "item",
        ClaimValue::Time { .. } => "time",
        ClaimValue::NoTarget => "no value",
        ClaimValue::Other(kind) => kind.as_str(),
    };
    ClaimError::Malformed {
        property: prop,
        reason: format!("expected {} value, found {}", wanted, found),
    }
}

const PRECISION_YEAR: u8 = 9;
const PRECISION_MONTH: u8 = 10;

/// Normalise a Wikibase timestamp (`+1952-03-11T00:00:00Z`) to `1952-03-11`.
///
/// Month and day finer than `precision` are reset to `01`, as is any `00`
/// placeholder, so a year-precision date reads as January 1st.
pub fn format_time(time: &str, precision: u8) -> Option<String> {
    let (negative, rest) = match time.as_bytes().first()? {
        b'+' => (false, &time[1..]),
        b'-' => (true, &time[1..]),
        _ => (false, time),
    };
    let date = rest.split('T').next()?;
    let mut parts = date.splitn(3, '-');
    let year: i32 = parts.next()?.parse().ok()?;
    let month: u32 = parts.next()?.parse().ok()?;
    let day: u32 = parts.next()?.parse().ok()?;

    let year = if negative { -year } else { year };
    let month = if precision <= PRECISION_YEAR { 1 } else { month.max(1) };
    let day = if precision <= PRECISION_MONTH { 1 } else { day.max(1) };
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(date.format("%Y-%m-%d").to_string())
}
