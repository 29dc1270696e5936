//! Country directory for the login form
//!
//! Fetched from a REST countries service. Any failure yields a small
//! built-in list instead of an error.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Country {
    pub name: String,
    /// ISO 3166-1 alpha-2
    pub code: String,
    /// International calling code, e.g. `+44`
    pub dial_code: String,
}

#[derive(Debug, Deserialize)]
struct RawCountry {
    name: RawName,
    cca2: String,
    #[serde(default)]
    idd: Option<RawIdd>,
}

#[derive(Debug, Deserialize)]
struct RawName {
    common: String,
}

#[derive(Debug, Deserialize)]
struct RawIdd {
    #[serde(default)]
    root: Option<String>,
    #[serde(default)]
    suffixes: Vec<String>,
}

impl From<RawCountry> for Country {
    fn from(raw: RawCountry) -> Self {
        let dial_code = match raw.idd {
            Some(RawIdd {
                root: Some(root),
                suffixes,
            }) => match suffixes.as_slice() {
                // one suffix completes the code; several are area prefixes
                [suffix] => format!("{}{}", root, suffix),
                _ => root,
            },
            _ => String::new(),
        };

        Country {
            name: raw.name.common,
            code: raw.cca2,
            dial_code,
        }
    }
}

const FALLBACK_COUNTRIES: &[(&str, &str, &str)] = &[
    ("United States", "US", "+1"),
    ("United Kingdom", "GB", "+44"),
    ("India", "IN", "+91"),
    ("Canada", "CA", "+1"),
    ("Australia", "AU", "+61"),
    ("Germany", "DE", "+49"),
    ("France", "FR", "+33"),
    ("Japan", "JP", "+81"),
    ("China", "CN", "+86"),
    ("Brazil", "BR", "+55"),
];

pub fn fallback_countries() -> Vec<Country> {
    FALLBACK_COUNTRIES
        .iter()
        .map(|(name, code, dial)| Country {
            name: name.to_string(),
            code: code.to_string(),
            dial_code: dial.to_string(),
        })
        .collect()
}

pub struct CountryDirectory {
    client: Client,
    url: String,
}

impl CountryDirectory {
    pub fn new(url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            client,
            url: url.into(),
        }
    }

    /// Every country sorted by name, or the built-in list on failure
    pub async fn list(&self) -> Vec<Country> {
        match self.fetch().await {
            Ok(countries) => countries,
            Err(e) => {
                tracing::warn!(url = %self.url, error = %e, "Failed to fetch countries, using built-in list");
                fallback_countries()
            }
        }
    }

    async fn fetch(&self) -> Result<Vec<Country>, reqwest::Error> {
        let raw: Vec<RawCountry> = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(sorted(raw))
    }
}

fn sorted(raw: Vec<RawCountry>) -> Vec<Country> {
    let mut countries: Vec<Country> = raw.into_iter().map(Country::from).collect();
    countries.sort_by(|a, b| a.name.cmp(&b.name));
    countries
}
