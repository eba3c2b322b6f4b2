//! The rate card: every business parameter the pricing rules read.
//!
//! A rate card is immutable once handed to a [`PricingEngine`]. Overrides are
//! loaded from JSON; any top-level field left out keeps its built-in value,
//! but a table that is given replaces the built-in table wholesale.
//!
//! [`PricingEngine`]: crate::pricing::engine::PricingEngine

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::errors::{PricingError, PricingResult};
use crate::models::{Model, Transform};

/// Which historical rule set the engine applies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSet {
    /// Explicit `tracks` list, per-pass diffusion pricing for every model.
    #[default]
    Current,
    /// `TRACK` markers counted in the sequence, length-tiered lcdna pricing.
    Legacy,
}

/// Tracks prediction: `base + per_track * track_count`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrackPricing {
    pub base: f64,
    pub per_track: f64,
}

impl Default for TrackPricing {
    fn default() -> Self {
        Self {
            base: 0.003,
            per_track: 0.000_03,
        }
    }
}

/// Legacy lcdna tier: flat pass cost up to `included_chars`, then linear.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LengthTier {
    pub included_chars: usize,
    pub per_extra_char: f64,
}

impl Default for LengthTier {
    fn default() -> Self {
        Self {
            included_chars: 30_000,
            per_extra_char: 0.000_001,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateCard {
    /// USD per token for per-token models.
    pub per_token_cost: BTreeMap<Model, f64>,
    /// USD per forward or denoising pass.
    pub per_pass_cost: BTreeMap<Model, f64>,
    pub tracks: TrackPricing,
    pub lcdna_tier: LengthTier,
    pub rule_set: RuleSet,
}

impl Default for RateCard {
    fn default() -> Self {
        let per_token_cost = BTreeMap::from([
            (Model::Esm2_650M, 0.000_000_18),
            (Model::Esm2_3B, 0.000_000_25),
            (Model::GinkgoMaskedlm3utrV1, 0.000_000_18),
            (Model::GinkgoAa0_650M, 0.000_000_18),
        ]);
        let per_pass_cost = BTreeMap::from([
            (Model::BorzoiHumanFold0, 0.0025),
            (Model::BorzoiDna, 0.0025),
            (Model::Abdiffusion, 0.0002),
            (Model::Lcdna, 0.01),
        ]);
        Self {
            per_token_cost,
            per_pass_cost,
            tracks: TrackPricing::default(),
            lcdna_tier: LengthTier::default(),
            rule_set: RuleSet::Current,
        }
    }
}

fn check_cost(label: &str, value: f64) -> PricingResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(PricingError::Config(format!(
            "{label} must be a non-negative finite number, got {value}"
        )))
    }
}

impl RateCard {
    pub fn from_json_str(json: &str) -> PricingResult<Self> {
        let card: RateCard = serde_json::from_str(json)?;
        card.validate()?;
        info!(
            "Loaded rate card ({:?} rules, {} per-token models, {} per-pass models)",
            card.rule_set,
            card.per_token_cost.len(),
            card.per_pass_cost.len()
        );
        Ok(card)
    }

    pub fn from_path(path: impl AsRef<Path>) -> PricingResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(PricingError::Config(format!(
                "rate card file not found: {}",
                path.display()
            )));
        }
        debug!("Reading rate card from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Reject negative and non-finite prices.
    pub fn validate(&self) -> PricingResult<()> {
        for (model, cost) in &self.per_token_cost {
            check_cost(&format!("per_token_cost[{model}]"), *cost)?;
        }
        for (model, cost) in &self.per_pass_cost {
            check_cost(&format!("per_pass_cost[{model}]"), *cost)?;
        }
        check_cost("tracks.base", self.tracks.base)?;
        check_cost("tracks.per_track", self.tracks.per_track)?;
        check_cost("lcdna_tier.per_extra_char", self.lcdna_tier.per_extra_char)?;
        Ok(())
    }

    pub fn per_token(&self, model: Model, transform: Transform) -> PricingResult<f64> {
        self.per_token_cost
            .get(&model)
            .copied()
            .ok_or_else(|| PricingError::unrecognized(model.as_str(), transform))
    }

    pub fn per_pass(&self, model: Model, transform: Transform) -> PricingResult<f64> {
        self.per_pass_cost
            .get(&model)
            .copied()
            .ok_or_else(|| PricingError::unrecognized(model.as_str(), transform))
    }

    /// SHA-256 hex digest of the card's canonical JSON form. Identical cards
    /// always hash the same; any price change yields a new digest.
    pub fn fingerprint(&self) -> PricingResult<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_tables() {
        let card = RateCard::default();
        assert_eq!(
            card.per_token(Model::Esm2_3B, Transform::Embedding).unwrap(),
            2.5e-7
        );
        assert_eq!(
            card.per_pass(Model::BorzoiHumanFold0, Transform::PromoterActivity)
                .unwrap(),
            0.0025
        );
        assert_eq!(card.tracks.base, 0.003);
        assert_eq!(card.lcdna_tier.included_chars, 30_000);
        assert_eq!(card.rule_set, RuleSet::Current);
        card.validate().unwrap();
    }

    #[test]
    fn test_lookup_outside_table_is_unrecognized() {
        let card = RateCard::default();
        let err = card
            .per_token(Model::Abdiffusion, Transform::FillMask)
            .unwrap_err();
        assert!(matches!(
            err,
            PricingError::UnrecognizedModel { ref model, transform: Transform::FillMask }
                if model == "abdiffusion"
        ));
    }

    #[test]
    fn test_partial_override_keeps_other_defaults() {
        let card = RateCard::from_json_str(r#"{"rule_set": "legacy", "tracks": {"base": 0.01, "per_track": 0.0}}"#)
            .unwrap();
        assert_eq!(card.rule_set, RuleSet::Legacy);
        assert_eq!(card.tracks.base, 0.01);
        assert_eq!(card.per_pass_cost, RateCard::default().per_pass_cost);
    }

    #[test]
    fn test_table_override_replaces_whole_table() {
        let card = RateCard::from_json_str(r#"{"per_token_cost": {"esm2_650M": 0.000001}}"#).unwrap();
        assert_eq!(
            card.per_token(Model::Esm2_650M, Transform::Embedding).unwrap(),
            0.000001
        );
        assert!(card.per_token(Model::Esm2_3B, Transform::Embedding).is_err());
    }

    #[test]
    fn test_rejects_negative_cost() {
        let err = RateCard::from_json_str(r#"{"per_pass_cost": {"lcdna": -0.5}}"#).unwrap_err();
        assert!(matches!(err, PricingError::Config(ref m) if m.contains("lcdna")));
    }

    #[test]
    fn test_rejects_unknown_model_key() {
        let err = RateCard::from_json_str(r#"{"per_pass_cost": {"alphafold": 1.0}}"#).unwrap_err();
        assert!(matches!(err, PricingError::Json(_)));
    }

    #[test]
    fn test_rejects_unknown_field() {
        let err = RateCard::from_json_str(r#"{"currency": "EUR"}"#).unwrap_err();
        assert!(matches!(err, PricingError::Json(_)));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"per_pass_cost": {{"abdiffusion": 0.0004}}}}"#).unwrap();
        let card = RateCard::from_path(file.path()).unwrap();
        assert_eq!(
            card.per_pass(Model::Abdiffusion, Transform::DiffusionGenerate)
                .unwrap(),
            0.0004
        );
    }

    #[test]
    fn test_from_path_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = RateCard::from_path(dir.path().join("prices.json")).unwrap_err();
        assert!(matches!(err, PricingError::Config(_)));
    }

    #[test]
    fn test_fingerprint_stable_and_sensitive() {
        let a = RateCard::default().fingerprint().unwrap();
        let b = RateCard::default().fingerprint().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let mut changed = RateCard::default();
        changed.tracks.per_track = 0.00004;
        assert_ne!(a, changed.fingerprint().unwrap());
    }
}
