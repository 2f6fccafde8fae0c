use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer};
use std::io::Read;

use crate::workflows::recruitment::repository::UserLookup;

pub(crate) const IDENTIFIER_COLUMNS: [&str; 3] = ["email", "username", "idnumber"];
pub(crate) const REQUIRED_COLUMNS: [&str; 2] = ["exemptiontype", "validfrom"];

/// One data row, or the reason it could not be decoded.
#[derive(Debug)]
pub(crate) struct ParsedRow {
    pub(crate) line: u64,
    pub(crate) row: Result<ExemptionRow, String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExemptionRow {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    email: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    username: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    idnumber: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub(crate) exemptiontype: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub(crate) documentref: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub(crate) notes: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub(crate) validfrom: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub(crate) validuntil: Option<String>,
}

impl ExemptionRow {
    /// First present identifier in `email`, `username`, `idnumber` order.
    pub(crate) fn lookup(&self) -> Option<UserLookup> {
        if let Some(email) = &self.email {
            return Some(UserLookup::Email(email.clone()));
        }
        if let Some(username) = &self.username {
            return Some(UserLookup::Username(username.clone()));
        }
        self.idnumber.clone().map(UserLookup::IdNumber)
    }
}

/// Header names are matched case-insensitively; the returned list holds the normalised names.
pub(crate) fn parse_rows<R: Read>(reader: R) -> Result<(Vec<String>, Vec<ParsedRow>), csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers: csv::StringRecord = csv_reader
        .headers()?
        .iter()
        .map(|header| header.trim().to_ascii_lowercase())
        .collect();
    csv_reader.set_headers(headers.clone());

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                let line = err.position().map_or(0, |position| position.line());
                rows.push(ParsedRow {
                    line,
                    row: Err(err.to_string()),
                });
                continue;
            }
        };
        let line = record.position().map_or(0, |position| position.line());
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        let row = record
            .deserialize::<ExemptionRow>(Some(&headers))
            .map_err(|err| err.to_string());
        rows.push(ParsedRow { line, row });
    }

    Ok((headers.iter().map(str::to_string).collect(), rows))
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

/// `YYYY-MM-DD` at the start of the day (UTC).
pub(crate) fn parse_start(value: &str) -> Option<DateTime<Utc>> {
    parse_date(value).map(|date| date.and_time(NaiveTime::MIN).and_utc())
}

/// `YYYY-MM-DD` at the last second of the day (UTC), so the end date is inclusive.
pub(crate) fn parse_end(value: &str) -> Option<DateTime<Utc>> {
    let end_of_day = NaiveTime::from_hms_opt(23, 59, 59)?;
    parse_date(value).map(|date| date.and_time(end_of_day).and_utc())
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}
