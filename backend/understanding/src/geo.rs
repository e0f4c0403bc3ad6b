//! Where the user probably is, and which language that suggests.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use lecturebuddy_core::language::{base_language, language_name};
use lecturebuddy_core::{GeoPosition, Geolocator};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

pub const DEFAULT_GEO_ENDPOINT: &str = "http://ip-api.com/json";

/// Approximate position from an IP geolocation service.
pub struct IpGeolocator {
    client: Client,
    endpoint: String,
}

impl IpGeolocator {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[derive(Deserialize)]
struct GeoReply {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(alias = "latitude")]
    lat: Option<f64>,
    #[serde(alias = "longitude")]
    lon: Option<f64>,
    #[serde(default, alias = "country_code")]
    #[serde(rename = "countryCode")]
    country_code: Option<String>,
}

fn position_from_reply(reply: GeoReply) -> Result<GeoPosition> {
    if reply.status.as_deref() == Some("fail") {
        anyhow::bail!(
            "Location lookup failed: {}",
            reply.message.unwrap_or_else(|| "unknown error".into())
        );
    }
    let (Some(latitude), Some(longitude)) = (reply.lat, reply.lon) else {
        anyhow::bail!("Location lookup returned no coordinates");
    };
    Ok(GeoPosition {
        latitude,
        longitude,
        accuracy: None,
        country_code: reply.country_code.map(|c| c.to_uppercase()),
    })
}

#[async_trait]
impl Geolocator for IpGeolocator {
    async fn locate(&self) -> Result<GeoPosition> {
        debug!(endpoint = %self.endpoint, "Looking up location");
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .context("Location request failed")?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Location service returned {}", status);
        }
        let reply: GeoReply = response
            .json()
            .await
            .context("Failed to parse location reply")?;
        position_from_reply(reply)
    }
}

/// A country and the language most of its people speak.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryLanguage {
    pub country_code: String,
    pub country_name: String,
    pub language_code: String,
    pub language_name: String,
}

// (alpha-2, English name, primary language)
const COUNTRIES: &[(&str, &str, &str)] = &[
    ("AR", "Argentina", "es"),
    ("AT", "Austria", "de"),
    ("AU", "Australia", "en"),
    ("BD", "Bangladesh", "bn"),
    ("BE", "Belgium", "nl"),
    ("BG", "Bulgaria", "bg"),
    ("BR", "Brazil", "pt"),
    ("CA", "Canada", "en"),
    ("CH", "Switzerland", "de"),
    ("CL", "Chile", "es"),
    ("CN", "China", "zh"),
    ("CO", "Colombia", "es"),
    ("CZ", "Czechia", "cs"),
    ("DE", "Germany", "de"),
    ("DK", "Denmark", "da"),
    ("EE", "Estonia", "et"),
    ("EG", "Egypt", "ar"),
    ("ES", "Spain", "es"),
    ("FI", "Finland", "fi"),
    ("FR", "France", "fr"),
    ("GB", "United Kingdom", "en"),
    ("GR", "Greece", "el"),
    ("HR", "Croatia", "hr"),
    ("HU", "Hungary", "hu"),
    ("ID", "Indonesia", "id"),
    ("IE", "Ireland", "en"),
    ("IL", "Israel", "he"),
    ("IN", "India", "hi"),
    ("IR", "Iran", "fa"),
    ("IS", "Iceland", "is"),
    ("IT", "Italy", "it"),
    ("JP", "Japan", "ja"),
    ("KE", "Kenya", "sw"),
    ("KR", "South Korea", "ko"),
    ("LT", "Lithuania", "lt"),
    ("LV", "Latvia", "lv"),
    ("MA", "Morocco", "ar"),
    ("MX", "Mexico", "es"),
    ("MY", "Malaysia", "ms"),
    ("NG", "Nigeria", "en"),
    ("NL", "Netherlands", "nl"),
    ("NO", "Norway", "no"),
    ("NZ", "New Zealand", "en"),
    ("PE", "Peru", "es"),
    ("PH", "Philippines", "fil"),
    ("PK", "Pakistan", "ur"),
    ("PL", "Poland", "pl"),
    ("PT", "Portugal", "pt"),
    ("RO", "Romania", "ro"),
    ("RS", "Serbia", "sr"),
    ("RU", "Russia", "ru"),
    ("SA", "Saudi Arabia", "ar"),
    ("SE", "Sweden", "sv"),
    ("SG", "Singapore", "en"),
    ("SI", "Slovenia", "sl"),
    ("SK", "Slovakia", "sk"),
    ("TH", "Thailand", "th"),
    ("TR", "Turkey", "tr"),
    ("TW", "Taiwan", "zh"),
    ("UA", "Ukraine", "uk"),
    ("US", "United States", "en"),
    ("VN", "Vietnam", "vi"),
    ("ZA", "South Africa", "en"),
];

fn to_country_language(entry: &(&str, &str, &str)) -> CountryLanguage {
    let (code, name, language) = *entry;
    CountryLanguage {
        country_code: code.to_string(),
        country_name: name.to_string(),
        language_code: language.to_string(),
        language_name: language_name(language),
    }
}

pub fn country_language_by_code(code: &str) -> Option<CountryLanguage> {
    COUNTRIES
        .iter()
        .find(|(c, _, _)| c.eq_ignore_ascii_case(code.trim()))
        .map(to_country_language)
}

fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut row = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            row[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(row[j] + 1);
        }
        prev = row;
    }
    prev[b.len()]
}

/// Exact, case-insensitive name match first; then prefix, substring and
/// small-typo matches, best first.
pub fn country_language_by_name(query: &str) -> Option<CountryLanguage> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return None;
    }
    if let Some(entry) = COUNTRIES.iter().find(|(_, name, _)| name.to_lowercase() == query) {
        return Some(to_country_language(entry));
    }

    let typo_budget = if query.chars().count() >= 5 { 2 } else { 1 };
    COUNTRIES
        .iter()
        .filter_map(|entry| {
            let name = entry.1.to_lowercase();
            let score = if name.starts_with(&query) {
                0
            } else if name.contains(&query) {
                1
            } else {
                let distance = edit_distance(&query, &name);
                if distance > typo_budget {
                    return None;
                }
                1 + distance
            };
            Some((score, entry))
        })
        .min_by_key(|(score, _)| *score)
        .map(|(_, entry)| to_country_language(entry))
}

/// Language of the process locale (`LC_ALL`, `LC_MESSAGES`, `LANG`).
pub fn locale_language() -> Option<String> {
    locale_language_from(|key| std::env::var(key).ok())
}

pub fn locale_language_from(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .into_iter()
        .filter_map(|key| lookup(key))
        .find(|value| !value.is_empty())
        .map(|value| base_language(&value))
        .filter(|code| !code.is_empty() && code != "c" && code != "posix")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_name_wins() {
        let found = country_language_by_name("  germany ").unwrap();
        assert_eq!(found.country_code, "DE");
        assert_eq!(found.language_code, "de");
        assert_eq!(found.language_name, "German");
    }

    #[test]
    fn fuzzy_matches_prefix_and_typos() {
        assert_eq!(country_language_by_name("Switz").unwrap().country_code, "CH");
        assert_eq!(country_language_by_name("Japn").unwrap().country_code, "JP");
        assert_eq!(country_language_by_name("Kingdom").unwrap().country_code, "GB");
    }

    #[test]
    fn unknown_country_is_none() {
        assert!(country_language_by_name("Atlantis").is_none());
        assert!(country_language_by_name("   ").is_none());
    }

    #[test]
    fn lookup_by_code() {
        assert_eq!(country_language_by_code("br").unwrap().language_code, "pt");
        assert!(country_language_by_code("XX").is_none());
    }

    #[test]
    fn locale_parsing() {
        let env = |key: &str| match key {
            "LANG" => Some("fr_FR.UTF-8".to_string()),
            _ => None,
        };
        assert_eq!(locale_language_from(env), Some("fr".to_string()));

        let posix = |key: &str| (key == "LC_ALL").then(|| "C".to_string());
        assert_eq!(locale_language_from(posix), None);
    }

    #[test]
    fn failed_lookup_is_an_error() {
        let reply: GeoReply =
            serde_json::from_str(r#"{"status":"fail","message":"private range"}"#).unwrap();
        assert!(position_from_reply(reply).is_err());

        let reply: GeoReply = serde_json::from_str(
            r#"{"status":"success","countryCode":"de","lat":52.5,"lon":13.4}"#,
        )
        .unwrap();
        let pos = position_from_reply(reply).unwrap();
        assert_eq!(pos.country_code.as_deref(), Some("DE"));
    }
}
