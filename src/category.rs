// Fixed lookup tables for the remote API: video categories and privacy
// statuses.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Category names and their numeric ids on the remote service, sorted by
/// name. The first entry is the fallback for unknown ids.
pub const CATEGORIES: [(&str, u32); 31] = [
    ("Action/Adventure", 32),
    ("Anime/Animation", 31),
    ("Autos & Vehicles", 2),
    ("Classics", 33),
    ("Comedy", 23),
    ("Documentary", 35),
    ("Drama", 36),
    ("Education", 27),
    ("Entertainment", 24),
    ("Family", 37),
    ("Film & Animation", 1),
    ("Foreign", 38),
    ("Gaming", 20),
    ("Horror", 39),
    ("Howto & Style", 26),
    ("Movies", 30),
    ("Music", 10),
    ("News & Politics", 25),
    ("Nonprofits & Activism", 29),
    ("People & Blogs", 22),
    ("Pets & Animals", 15),
    ("Sci-Fi/Fantasy", 40),
    ("Science & Technology", 28),
    ("Short Movies", 18),
    ("Shorts", 42),
    ("Shows", 43),
    ("Sports", 17),
    ("Thriller", 41),
    ("Trailers", 44),
    ("Travel & Events", 19),
    ("Videoblogging", 21),
];

pub fn names() -> impl Iterator<Item = &'static str> {
    CATEGORIES.iter().map(|(name, _)| *name)
}

pub fn code_for(name: &str) -> Option<u32> {
    CATEGORIES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, code)| *code)
}

pub fn name_for(code: u32) -> Option<&'static str> {
    CATEGORIES
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(name, _)| *name)
}

/// Reverse lookup that never fails: unknown or unparsable ids map to the
/// first table entry.
pub fn name_for_id_or_default(id: &str) -> &'static str {
    id.trim()
        .parse()
        .ok()
        .and_then(name_for)
        .unwrap_or(CATEGORIES[0].0)
}

pub fn index_of(name: &str) -> Option<usize> {
    CATEGORIES.iter().position(|(n, _)| *n == name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyStatus {
    Private,
    Unlisted,
    Public,
}

impl PrivacyStatus {
    pub const ALL: [PrivacyStatus; 3] = [
        PrivacyStatus::Private,
        PrivacyStatus::Unlisted,
        PrivacyStatus::Public,
    ];

    /// Lower-case form sent to the remote service.
    pub fn as_str(self) -> &'static str {
        match self {
            PrivacyStatus::Private => "private",
            PrivacyStatus::Unlisted => "unlisted",
            PrivacyStatus::Public => "public",
        }
    }

    /// Capitalized form shown in prompts.
    pub fn label(self) -> &'static str {
        match self {
            PrivacyStatus::Private => "Private",
            PrivacyStatus::Unlisted => "Unlisted",
            PrivacyStatus::Public => "Public",
        }
    }

    pub fn index(self) -> usize {
        Self::ALL.iter().position(|s| *s == self).unwrap_or(0)
    }
}

impl fmt::Display for PrivacyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown privacy status `{0}` (expected private, unlisted or public)")]
pub struct UnknownPrivacyStatus(String);

impl FromStr for PrivacyStatus {
    type Err = UnknownPrivacyStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == lower)
            .ok_or_else(|| UnknownPrivacyStatus(s.to_string()))
    }
}
