//! Pricing rule engine.
//!
//! Dispatches on the request variant, reads the rate card, and applies the
//! matching formula. Only the features the selected rule needs are extracted.

use std::sync::LazyLock;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::errors::{PricingError, PricingResult};
use crate::features::tokenizer::{
    count_masked_tokens, count_tokens, count_track_markers, sequence_length,
};
use crate::models::{
    validate_unmaskings, DiffusionModel, DiffusionRequest, Model, Price, Request,
    SequenceRequest, TracksPredictionRequest, Transform,
};
use crate::pricing::rate_card::{RateCard, RuleSet};

static DEFAULT_ENGINE: LazyLock<PricingEngine> = LazyLock::new(PricingEngine::default);

/// Price a request with the built-in rate card.
pub fn compute_price(request: &Request) -> PricingResult<Price> {
    DEFAULT_ENGINE.price(request)
}

pub fn default_engine() -> &'static PricingEngine {
    &DEFAULT_ENGINE
}

#[derive(Clone, Debug, Default)]
pub struct PricingEngine {
    rate_card: RateCard,
}

impl PricingEngine {
    pub fn new(rate_card: RateCard) -> PricingResult<Self> {
        rate_card.validate()?;
        Ok(Self { rate_card })
    }

    pub fn rate_card(&self) -> &RateCard {
        &self.rate_card
    }

    pub fn price(&self, request: &Request) -> PricingResult<Price> {
        let transform = request.transform();
        let result = match request {
            Request::Embedding(r) | Request::FillMask(r) => self.price_per_token(r, transform),
            Request::PromoterActivity(_) => {
                // One borzoi-human-fold0 pass regardless of the request's
                // model, sequence lengths or tissue count.
                self.rate_card.per_pass(Model::BorzoiHumanFold0, transform)
            }
            Request::TracksPrediction(r) => Ok(self.price_tracks(r)),
            Request::DiffusionGenerate(r) | Request::DiffusionUnmasking(r) => {
                self.price_diffusion(r, transform)
            }
        };

        match &result {
            Ok(price) => debug!(
                "Priced {} request on {}: {price}",
                transform,
                request.model()
            ),
            Err(PricingError::UnrecognizedModel { model, .. }) => {
                warn!("No {transform} price for model {model}")
            }
            Err(e) => debug!("Rejected {transform} request: {e}"),
        }
        result
    }

    /// Price every request independently, in parallel. Output order matches
    /// input order.
    pub fn price_batch(&self, requests: &[Request]) -> Vec<PricingResult<Price>> {
        requests.par_iter().map(|r| self.price(r)).collect()
    }

    fn price_per_token(&self, r: &SequenceRequest, transform: Transform) -> PricingResult<Price> {
        let per_token = self.rate_card.per_token(r.model.into(), transform)?;
        Ok(per_token * count_tokens(&r.sequence) as f64)
    }

    fn price_tracks(&self, r: &TracksPredictionRequest) -> Price {
        let track_count = match self.rate_card.rule_set {
            RuleSet::Current => r.tracks.len(),
            RuleSet::Legacy => count_track_markers(&r.sequence),
        };
        let tracks = &self.rate_card.tracks;
        tracks.base + tracks.per_track * track_count as f64
    }

    fn price_diffusion(&self, r: &DiffusionRequest, transform: Transform) -> PricingResult<Price> {
        let unmaskings = validate_unmaskings(r.unmaskings_per_step)?;
        if self.rate_card.rule_set == RuleSet::Legacy && r.model == DiffusionModel::Lcdna {
            return self.price_lcdna_tier(&r.sequence, transform);
        }
        let pass_cost = self.rate_card.per_pass(r.model.into(), transform)?;
        // Fractional passes are charged proportionally.
        let passes = count_masked_tokens(&r.sequence) as f64 / unmaskings;
        Ok(pass_cost * passes)
    }

    fn price_lcdna_tier(&self, sequence: &str, transform: Transform) -> PricingResult<Price> {
        let base = self.rate_card.per_pass(Model::Lcdna, transform)?;
        let tier = &self.rate_card.lcdna_tier;
        let length = sequence_length(sequence);
        if length <= tier.included_chars {
            return Ok(base);
        }
        Ok(base + tier.per_extra_char * (length - tier.included_chars) as f64)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
