//! Company scoring: three weighted sub-scores combined into a 0-100 total.

use std::sync::{PoisonError, RwLock};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ResearchError;
use crate::model::{Entity, ScoreBreakdown};

const WEIGHT_TOLERANCE: f64 = 1e-6;
const HEADLINE_SATURATION: f64 = 10.0;
const DEFAULT_RELEVANCE: f64 = 0.5;

/// Upper bound (exclusive, USD) and factor for each funding tier.
const FUNDING_TIERS: &[(f64, f64)] = &[
    (2_000_000.0, 0.2),   // seed
    (15_000_000.0, 0.4),  // series A
    (50_000_000.0, 0.6),  // series B
    (150_000_000.0, 0.8), // series C
    (f64::INFINITY, 1.0), // series D and later
];

const RELEVANCE_TABLE: &[(&str, f64)] = &[
    ("artificial intelligence", 1.0),
    ("ai", 1.0),
    ("generative ai", 1.0),
    ("machine learning", 0.95),
    ("cybersecurity", 0.9),
    ("fintech", 0.85),
    ("climate tech", 0.85),
    ("robotics", 0.85),
    ("developer tools", 0.8),
    ("enterprise software", 0.8),
    ("saas", 0.75),
    ("healthcare", 0.75),
    ("healthtech", 0.75),
    ("biotech", 0.7),
    ("e-commerce", 0.6),
    ("edtech", 0.6),
    ("consumer", 0.5),
    ("media", 0.4),
    ("real estate", 0.4),
];

static AMOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d[\d,]*(?:\.\d+)?)\s*(billion|million|thousand|bn|mm|[bmk])?\b")
        .expect("invalid funding amount regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringWeights {
    pub funding_stage: f64,
    pub market_buzz: f64,
    pub strategic_relevance: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            funding_stage: 0.3,
            market_buzz: 0.3,
            strategic_relevance: 0.4,
        }
    }
}

impl ScoringWeights {
    pub fn validate(&self) -> Result<(), ResearchError> {
        let weights = [
            ("fundingStage", self.funding_stage),
            ("marketBuzz", self.market_buzz),
            ("strategicRelevance", self.strategic_relevance),
        ];
        for (name, value) in weights {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(ResearchError::validation(format!(
                    "{name} weight must be between 0 and 1, got {value}"
                )));
            }
        }
        let sum = self.funding_stage + self.market_buzz + self.strategic_relevance;
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(ResearchError::validation(format!(
                "scoring weights must sum to 1, got {sum:.3}"
            )));
        }
        Ok(())
    }
}

/// Process-wide scoring weights. Updates that break the sum-to-one
/// invariant are rejected and leave the stored weights untouched.
#[derive(Debug, Default)]
pub struct ScoringConfig {
    weights: RwLock<ScoringWeights>,
}

impl ScoringConfig {
    pub fn new(weights: ScoringWeights) -> Result<Self, ResearchError> {
        weights.validate()?;
        Ok(Self {
            weights: RwLock::new(weights),
        })
    }

    pub fn weights(&self) -> ScoringWeights {
        *self.weights.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn update_weights(&self, weights: ScoringWeights) -> Result<(), ResearchError> {
        weights.validate()?;
        *self.weights.write().unwrap_or_else(PoisonError::into_inner) = weights;
        tracing::info!(?weights, "scoring weights updated");
        Ok(())
    }

    pub fn score(&self, entity: &Entity) -> ScoreBreakdown {
        score_entity(entity, &self.weights())
    }
}

/// Parse strings such as `$45.5 million`, `$1.2B` or `$3,000,000` into USD.
pub fn parse_funding_amount(raw: &str) -> Option<f64> {
    let caps = AMOUNT.captures(raw)?;
    let number: f64 = caps.get(1)?.as_str().replace(',', "").parse().ok()?;
    let multiplier = match caps
        .get(2)
        .map(|unit| unit.as_str().to_ascii_lowercase())
        .as_deref()
    {
        Some("billion" | "bn" | "b") => 1_000_000_000.0,
        Some("million" | "mm" | "m") => 1_000_000.0,
        Some("thousand" | "k") => 1_000.0,
        _ => 1.0,
    };
    Some(number * multiplier)
}

/// Funding tier factor in `[0.2, 1.0]`. Missing or unparseable amounts count as seed.
pub fn funding_factor(funding_amount: Option<&str>) -> f64 {
    let Some(amount) = funding_amount.and_then(parse_funding_amount) else {
        return FUNDING_TIERS[0].1;
    };
    FUNDING_TIERS
        .iter()
        .find(|(upper, _)| amount < *upper)
        .map(|(_, factor)| *factor)
        .unwrap_or(1.0)
}

pub fn buzz_factor(headline_count: usize) -> f64 {
    (headline_count as f64 / HEADLINE_SATURATION).min(1.0)
}

pub fn relevance_factor(focus_area: Option<&str>) -> f64 {
    let Some(focus) = focus_area else {
        return DEFAULT_RELEVANCE;
    };
    let key = focus
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    RELEVANCE_TABLE
        .iter()
        .find(|(area, _)| *area == key)
        .map(|(_, factor)| *factor)
        .unwrap_or(DEFAULT_RELEVANCE)
}

/// Pure scoring function; identical input always yields identical output.
pub fn score_entity(entity: &Entity, weights: &ScoringWeights) -> ScoreBreakdown {
    let funding_score = round2(
        funding_factor(entity.funding_amount.as_deref()) * weights.funding_stage * 100.0,
    );
    let buzz_score = round2(buzz_factor(entity.news_headlines.len()) * weights.market_buzz * 100.0);
    let relevance_score = round2(
        relevance_factor(entity.focus_area.as_deref()) * weights.strategic_relevance * 100.0,
    );
    let total = (funding_score + buzz_score + relevance_score).round();

    ScoreBreakdown {
        funding_score,
        buzz_score,
        relevance_score,
        total_score: total.clamp(0.0, 100.0) as u32,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(funding: Option<&str>, headlines: usize, focus: Option<&str>) -> Entity {
        Entity {
            name: "Acme".into(),
            funding_amount: funding.map(str::to_string),
            news_headlines: (0..headlines).map(|i| format!("headline {i}")).collect(),
            focus_area: focus.map(str::to_string),
            ..Entity::default()
        }
    }

    #[test]
    fn parses_common_amount_shapes() {
        assert_eq!(parse_funding_amount("$45.5 million"), Some(45_500_000.0));
        assert_eq!(parse_funding_amount("$1.2B"), Some(1_200_000_000.0));
        assert_eq!(parse_funding_amount("$500K"), Some(500_000.0));
        assert_eq!(parse_funding_amount("$3,000,000"), Some(3_000_000.0));
        assert_eq!(parse_funding_amount("undisclosed"), None);
    }

    #[test]
    fn funding_tiers_map_to_factors() {
        assert_eq!(funding_factor(None), 0.2);
        assert_eq!(funding_factor(Some("$1 million")), 0.2);
        assert_eq!(funding_factor(Some("$10 million")), 0.4);
        assert_eq!(funding_factor(Some("$30 million")), 0.6);
        assert_eq!(funding_factor(Some("$100 million")), 0.8);
        assert_eq!(funding_factor(Some("$2 billion")), 1.0);
    }

    #[test]
    fn buzz_saturates_at_ten_headlines() {
        assert_eq!(buzz_factor(0), 0.0);
        assert_eq!(buzz_factor(5), 0.5);
        assert_eq!(buzz_factor(10), 1.0);
        assert_eq!(buzz_factor(40), 1.0);
    }

    #[test]
    fn relevance_lookup_is_case_insensitive_with_default() {
        assert_eq!(relevance_factor(Some("  Artificial   Intelligence ")), 1.0);
        assert_eq!(relevance_factor(Some("FinTech")), 0.85);
        assert_eq!(relevance_factor(Some("underwater basket weaving")), 0.5);
        assert_eq!(relevance_factor(None), 0.5);
    }

    #[test]
    fn default_weights_scale_to_thirty_thirty_forty() {
        let weights = ScoringWeights::default();
        let best = score_entity(
            &entity(Some("$500 million"), 12, Some("AI")),
            &weights,
        );
        assert_eq!(best.funding_score, 30.0);
        assert_eq!(best.buzz_score, 30.0);
        assert_eq!(best.relevance_score, 40.0);
        assert_eq!(best.total_score, 100);

        let empty = score_entity(&entity(None, 0, None), &weights);
        assert_eq!(empty.funding_score, 6.0);
        assert_eq!(empty.buzz_score, 0.0);
        assert_eq!(empty.relevance_score, 20.0);
        assert_eq!(empty.total_score, 26);
    }

    #[test]
    fn sub_scores_stay_in_bounds_and_total_is_rounded_sum() {
        let weights = ScoringWeights::default();
        let fundings = [None, Some("$900K"), Some("$12M"), Some("$49.9 million"), Some("$3B")];
        let focuses = [None, Some("ai"), Some("media"), Some("unknown sector")];
        for funding in fundings {
            for headlines in [0, 3, 7, 10, 25] {
                for focus in focuses {
                    let score = score_entity(&entity(funding, headlines, focus), &weights);
                    assert!((0.0..=30.0).contains(&score.funding_score));
                    assert!((0.0..=30.0).contains(&score.buzz_score));
                    assert!((0.0..=40.0).contains(&score.relevance_score));
                    let sum = score.funding_score + score.buzz_score + score.relevance_score;
                    assert_eq!(score.total_score, sum.round() as u32);
                }
            }
        }
    }

    #[test]
    fn scoring_is_deterministic() {
        let weights = ScoringWeights::default();
        let subject = entity(Some("$20M"), 4, Some("robotics"));
        assert_eq!(score_entity(&subject, &weights), score_entity(&subject, &weights));
    }

    #[test]
    fn invalid_weight_update_is_rejected_and_config_unchanged() {
        let config = ScoringConfig::default();
        let before = config.weights();

        let err = config
            .update_weights(ScoringWeights {
                funding_stage: 0.2,
                market_buzz: 0.2,
                strategic_relevance: 0.2,
            })
            .unwrap_err();

        assert!(matches!(err, ResearchError::Validation(_)));
        assert_eq!(config.weights(), before);
    }

    #[test]
    fn valid_weight_update_changes_scale() {
        let config = ScoringConfig::default();
        config
            .update_weights(ScoringWeights {
                funding_stage: 0.5,
                market_buzz: 0.25,
                strategic_relevance: 0.25,
            })
            .unwrap();

        let score = config.score(&entity(Some("$2 billion"), 0, None));
        assert_eq!(score.funding_score, 50.0);
        assert_eq!(score.relevance_score, 12.5);
        assert_eq!(score.total_score, 63);
    }
}
