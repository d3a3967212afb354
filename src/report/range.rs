use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::AppError;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub const MISSING_DATES_MESSAGE: &str = "Veuillez sélectionner les deux dates !";

/// Raw date inputs as submitted by the date pickers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DateRangeInput {
    #[serde(default)]
    pub date_debut: Option<String>,
    #[serde(default)]
    pub date_fin: Option<String>,
}

/// Inclusive reporting period. Ordering between `start` and `end` is not
/// enforced here; the backend decides what an inverted range means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    #[serde(rename = "date_debut", serialize_with = "serialize_date")]
    pub start: NaiveDate,
    #[serde(rename = "date_fin", serialize_with = "serialize_date")]
    pub end: NaiveDate,
}

fn serialize_date<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&date.format(DATE_FORMAT))
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn is_inverted(&self) -> bool {
        self.start > self.end
    }

    /// "du 2024-01-01 au 2024-01-31"
    pub fn period_label(&self) -> String {
        format!(
            "du {} au {}",
            self.start.format(DATE_FORMAT),
            self.end.format(DATE_FORMAT)
        )
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.period_label())
    }
}

impl DateRangeInput {
    pub fn new(date_debut: impl Into<String>, date_fin: impl Into<String>) -> Self {
        Self {
            date_debut: Some(date_debut.into()),
            date_fin: Some(date_fin.into()),
        }
    }

    pub fn is_blank(&self) -> bool {
        present(&self.date_debut).is_none() && present(&self.date_fin).is_none()
    }

    pub fn validate(&self) -> Result<DateRange, AppError> {
        let (Some(start), Some(end)) = (present(&self.date_debut), present(&self.date_fin)) else {
            return Err(AppError::Validation(MISSING_DATES_MESSAGE.to_string()));
        };

        let start = parse_date("date_debut", start)?;
        let end = parse_date("date_fin", end)?;
        Ok(DateRange::new(start, end))
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| {
        AppError::Validation(format!("{field} invalide ({raw:?}), format attendu AAAA-MM-JJ"))
    })
}
