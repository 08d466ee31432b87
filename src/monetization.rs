//! # Monetization Estimator
//! Estimated ad-revenue rate (USD per 1000 views) for a niche.
//!
//! Category resolution, first success wins:
//! 1. exact: every token of a keyword phrase appears in the niche tokens
//! 2. fuzzy: token-set similarity ≥ `fuzzy_threshold` against any keyword
//! 3. hint: a coarse default for the caller's broad category
//! 4. default: the global fallback, marked with low confidence
//!
//! The base rate is then scaled by a viewer-country and a month multiplier.
//! Every multiplier applied is echoed back in the estimate.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use strsim::normalized_levenshtein;

const EMBEDDED_TABLE: &str = include_str!("../config/monetization.toml");

pub const EXACT_CONFIDENCE: f64 = 0.95;
pub const FUZZY_CONFIDENCE_SCALE: f64 = 0.9;
pub const HINT_CONFIDENCE: f64 = 0.6;
pub const DEFAULT_CONFIDENCE: f64 = 0.3;
pub const UNKNOWN_CATEGORY: &str = "unknown";

#[derive(Debug, Clone, Deserialize)]
pub struct Category {
    pub name: String,
    pub base_rate: f64,
    pub low: f64,
    pub high: f64,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonetizationTable {
    pub default_rate: f64,
    pub default_low: f64,
    pub default_high: f64,
    pub unlisted_geo_multiplier: f64,
    pub fuzzy_threshold: f64,
    pub seasonal: Vec<f64>,
    pub geo: HashMap<String, f64>,
    #[serde(default)]
    pub hints: HashMap<String, f64>,
    pub categories: Vec<Category>,
}

impl MonetizationTable {
    pub fn embedded() -> anyhow::Result<Self> {
        Self::from_toml_str(EMBEDDED_TABLE)
    }

    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => {
                let content = fs::read_to_string(p)
                    .with_context(|| format!("reading monetization table at {}", p.display()))?;
                Self::from_toml_str(&content)
            }
            None => Self::embedded(),
        }
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let mut table: MonetizationTable =
            toml::from_str(s).context("parsing monetization table")?;
        if table.seasonal.len() != 12 {
            bail!(
                "seasonal table needs 12 month multipliers, got {}",
                table.seasonal.len()
            );
        }
        if !(0.0..=1.0).contains(&table.fuzzy_threshold) {
            bail!("fuzzy_threshold must be within 0..=1");
        }
        if table.categories.is_empty() {
            bail!("monetization table has no categories");
        }
        if table.default_rate <= 0.0 {
            bail!("default_rate must be positive");
        }
        if let Some((name, _)) = table.hints.iter().find(|(_, r)| **r <= 0.0) {
            bail!("hint `{name}` needs a positive rate");
        }
        table.geo = table
            .geo
            .into_iter()
            .map(|(k, v)| (k.to_ascii_uppercase(), v))
            .collect();
        table.hints = table
            .hints
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        for c in &mut table.categories {
            if c.base_rate <= 0.0 {
                bail!("category `{}` needs a positive base_rate", c.name);
            }
            if c.low > c.base_rate || c.base_rate > c.high {
                bail!("category `{}` needs low <= base_rate <= high", c.name);
            }
            for k in &mut c.keywords {
                *k = k.trim().to_lowercase();
            }
        }
        Ok(table)
    }

    fn category(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }
}

/* ----------------------------
Output
---------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Fuzzy,
    CategoryHint,
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoMultiplier {
    /// Country code used for the lookup, `None` when no region was given.
    pub region: Option<String>,
    pub value: f64,
    pub listed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonalMultiplier {
    pub month: u32,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonetizationEstimate {
    pub niche: String,
    pub category: String,
    pub match_kind: MatchKind,
    /// Keyword or hint that produced the category.
    pub matched: Option<String>,
    pub base_rate: f64,
    pub rate: f64,
    pub rate_low: f64,
    pub rate_high: f64,
    /// 0–1.
    pub confidence: f64,
    pub geo: GeoMultiplier,
    pub seasonal: SeasonalMultiplier,
}

struct Resolved<'a> {
    category: &'a str,
    kind: MatchKind,
    matched: Option<String>,
    base: f64,
    low: f64,
    high: f64,
    confidence: f64,
}

pub struct MonetizationEstimator {
    table: MonetizationTable,
}

impl MonetizationEstimator {
    pub fn new(table: MonetizationTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &MonetizationTable {
        &self.table
    }

    pub fn estimate(
        &self,
        niche: &str,
        region: Option<&str>,
        category_hint: Option<&str>,
        as_of: DateTime<Utc>,
    ) -> MonetizationEstimate {
        let tokens = tokenize(niche);
        let resolved = self
            .exact(&tokens)
            .or_else(|| self.fuzzy(&tokens))
            .or_else(|| category_hint.and_then(|h| self.hint(h)))
            .unwrap_or_else(|| self.global_default());

        let geo = self.geo(region);
        let month = as_of.month();
        let seasonal = SeasonalMultiplier {
            month,
            value: self.table.seasonal[(month - 1) as usize],
        };
        let factor = geo.value * seasonal.value;

        MonetizationEstimate {
            niche: niche.to_string(),
            category: resolved.category.to_string(),
            match_kind: resolved.kind,
            matched: resolved.matched,
            base_rate: round2(resolved.base),
            rate: round2(resolved.base * factor),
            rate_low: round2(resolved.low * factor),
            rate_high: round2(resolved.high * factor),
            confidence: round2(resolved.confidence),
            geo,
            seasonal,
        }
    }

    fn exact(&self, tokens: &[String]) -> Option<Resolved<'_>> {
        let niche: BTreeSet<&str> = tokens.iter().map(String::as_str).collect();
        let mut best: Option<(usize, &Category, &str)> = None;
        for cat in &self.table.categories {
            for kw in &cat.keywords {
                let kw_tokens = tokenize(kw);
                if kw_tokens.is_empty() || !kw_tokens.iter().all(|t| niche.contains(t.as_str())) {
                    continue;
                }
                let overlap = kw_tokens.len();
                if best.map_or(true, |(o, _, _)| overlap > o) {
                    best = Some((overlap, cat, kw.as_str()));
                }
            }
        }
        best.map(|(_, cat, kw)| Resolved {
            category: &cat.name,
            kind: MatchKind::Exact,
            matched: Some(kw.to_string()),
            base: cat.base_rate,
            low: cat.low,
            high: cat.high,
            confidence: EXACT_CONFIDENCE,
        })
    }

    fn fuzzy(&self, tokens: &[String]) -> Option<Resolved<'_>> {
        if tokens.is_empty() {
            return None;
        }
        let mut best: Option<(f64, &Category, &str)> = None;
        for cat in &self.table.categories {
            for kw in &cat.keywords {
                let sim = token_set_similarity(tokens, &tokenize(kw));
                if best.map_or(true, |(s, _, _)| sim > s) {
                    best = Some((sim, cat, kw.as_str()));
                }
            }
        }
        let (sim, cat, kw) = best?;
        if sim < self.table.fuzzy_threshold {
            return None;
        }
        Some(Resolved {
            category: &cat.name,
            kind: MatchKind::Fuzzy,
            matched: Some(kw.to_string()),
            base: cat.base_rate,
            low: cat.low,
            high: cat.high,
            confidence: FUZZY_CONFIDENCE_SCALE * sim,
        })
    }

    fn hint(&self, hint: &str) -> Option<Resolved<'_>> {
        let key = hint.trim().to_lowercase();
        let (name, rate) = self.table.hints.get_key_value(&key)?;
        // Reuse the full category's spread when the hint names one.
        let (low, high) = match self.table.category(name) {
            Some(c) => (c.low / c.base_rate * rate, c.high / c.base_rate * rate),
            None => (rate * 0.5, rate * 1.6),
        };
        Some(Resolved {
            category: name,
            kind: MatchKind::CategoryHint,
            matched: Some(key),
            base: *rate,
            low,
            high,
            confidence: HINT_CONFIDENCE,
        })
    }

    fn global_default(&self) -> Resolved<'_> {
        Resolved {
            category: UNKNOWN_CATEGORY,
            kind: MatchKind::Default,
            matched: None,
            base: self.table.default_rate,
            low: self.table.default_low,
            high: self.table.default_high,
            confidence: DEFAULT_CONFIDENCE,
        }
    }

    fn geo(&self, region: Option<&str>) -> GeoMultiplier {
        match region {
            None => GeoMultiplier {
                region: None,
                value: 1.0,
                listed: false,
            },
            Some(r) => {
                let key = r.trim().to_ascii_uppercase();
                match self.table.geo.get(&key) {
                    Some(v) => GeoMultiplier {
                        region: Some(key),
                        value: *v,
                        listed: true,
                    },
                    None => GeoMultiplier {
                        region: Some(key),
                        value: self.table.unlisted_geo_multiplier,
                        listed: false,
                    },
                }
            }
        }
    }
}

/// Lower-cased alphanumeric tokens.
pub fn tokenize(s: &str) -> Vec<String> {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Token-set similarity in 0..=1: compare the sorted shared tokens with each
/// side's shared-plus-remaining tokens and keep the best pairing. Word order
/// and extra tokens on one side do not count against a match.
pub fn token_set_similarity(a: &[String], b: &[String]) -> f64 {
    let sa: BTreeSet<&str> = a.iter().map(String::as_str).collect();
    let sb: BTreeSet<&str> = b.iter().map(String::as_str).collect();
    if sa.is_empty() || sb.is_empty() {
        return 0.0;
    }
    if sa == sb {
        return 1.0;
    }

    let join = |it: Vec<&str>| it.join(" ");
    let shared = join(sa.intersection(&sb).copied().collect());
    let only_a = join(sa.difference(&sb).copied().collect());
    let only_b = join(sb.difference(&sa).copied().collect());
    let with = |rest: &str| match (shared.is_empty(), rest.is_empty()) {
        (true, _) => rest.to_string(),
        (false, true) => shared.clone(),
        (false, false) => format!("{shared} {rest}"),
    };
    let full_a = with(&only_a);
    let full_b = with(&only_b);

    let mut best: f64 = 0.0;
    for (x, y) in [(&shared, &full_a), (&shared, &full_b), (&full_a, &full_b)] {
        if x.is_empty() || y.is_empty() {
            continue;
        }
        best = best.max(normalized_levenshtein(x, y));
    }
    best
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
