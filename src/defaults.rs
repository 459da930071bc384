// Upload defaults read from `defaults.json`, turned into the initial
// values of the upload form.

use std::path::Path;

use chrono::{DateTime, Duration, Local, NaiveTime, TimeZone};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::category::{self, PrivacyStatus};
use crate::error::StoreError;
use crate::store;

/// Contents of the defaults file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DefaultsFile {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category: String,
    pub privacy_status: String,
    /// Local time of day as `HHMM`.
    pub publish_time: String,
}

/// Initial values for the upload form.
#[derive(Debug, Clone, PartialEq)]
pub struct FormDefaults {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    /// Index into `category::CATEGORIES`.
    pub category_index: usize,
    /// Index into `PrivacyStatus::ALL`.
    pub privacy_index: usize,
    /// Tomorrow at the configured time, RFC 3339.
    pub publish_at: String,
}

impl FormDefaults {
    /// A missing file gives the built-in defaults; a malformed one is an
    /// error.
    pub fn load(path: &Path, now: DateTime<Local>) -> Result<Self, StoreError> {
        let file = match store::read_json::<DefaultsFile>(path) {
            Ok(file) => file,
            Err(StoreError::NotFound(_)) => {
                debug!("No defaults file at {}", path.display());
                DefaultsFile::default()
            }
            Err(err) => return Err(err),
        };
        Ok(Self::resolve(file, now))
    }

    pub fn resolve(file: DefaultsFile, now: DateTime<Local>) -> Self {
        let category_index = category::index_of(&file.category).unwrap_or(0);
        let privacy_index = file
            .privacy_status
            .parse::<PrivacyStatus>()
            .map(PrivacyStatus::index)
            .unwrap_or(0);

        FormDefaults {
            title: file.title,
            description: file.description,
            tags: file.tags,
            category_index,
            privacy_index,
            publish_at: tomorrow_at(&file.publish_time, now),
        }
    }
}

fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    if value.len() != 4 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours = value[..2].parse().ok()?;
    let minutes = value[2..].parse().ok()?;
    NaiveTime::from_hms_opt(hours, minutes, 0)
}

/// Midnight of the day after `now`, plus `HHMM`. Unusable values count
/// as `0000`.
fn tomorrow_at(hhmm: &str, now: DateTime<Local>) -> String {
    let time = parse_hhmm(hhmm).unwrap_or_else(|| {
        if !hhmm.is_empty() {
            warn!("Ignoring publish_time `{hhmm}`, expected HHMM");
        }
        NaiveTime::default()
    });

    let day = now.date_naive() + Duration::days(1);
    let naive = day.and_time(time);
    let local = Local
        .from_local_datetime(&naive)
        .earliest()
        .or_else(|| Local.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .unwrap_or(now + Duration::days(1));
    local.to_rfc3339()
}
