//! Typed request models shared by the feature extractor and the pricing engine.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::{PricingError, PricingResult};

/// Price in USD. Unit is implicit; no currency metadata is carried.
pub type Price = f64;

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

/// The kind of model operation being priced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Transform {
    Embedding,
    FillMask,
    PromoterActivity,
    TracksPrediction,
    DiffusionGenerate,
    DiffusionUnmasking,
}

impl Transform {
    pub const ALL: [Transform; 6] = [
        Transform::Embedding,
        Transform::FillMask,
        Transform::PromoterActivity,
        Transform::TracksPrediction,
        Transform::DiffusionGenerate,
        Transform::DiffusionUnmasking,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Transform::Embedding => "EMBEDDING",
            Transform::FillMask => "FILL_MASK",
            Transform::PromoterActivity => "PROMOTER_ACTIVITY",
            Transform::TracksPrediction => "TRACKS_PREDICTION",
            Transform::DiffusionGenerate => "DIFFUSION_GENERATE",
            Transform::DiffusionUnmasking => "DIFFUSION_UNMASKING",
        }
    }

    /// Parse a transform tag. `GENERATE` is the pre-split name of
    /// `DIFFUSION_GENERATE` and is still accepted.
    pub fn parse(tag: &str) -> Option<Transform> {
        let tag = tag.trim();
        if tag == "GENERATE" {
            return Some(Transform::DiffusionGenerate);
        }
        Transform::ALL.into_iter().find(|t| t.as_str() == tag)
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Every model backend known to the rate card.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Model {
    #[serde(rename = "esm2-650M", alias = "esm2_650M")]
    Esm2_650M,
    #[serde(rename = "esm2-3B", alias = "esm2_3B")]
    Esm2_3B,
    #[serde(rename = "ginkgo-maskedlm-3utr-v1", alias = "ginkgo_maskedlm_3utr_v1")]
    GinkgoMaskedlm3utrV1,
    #[serde(rename = "ginkgo-aa0-650M", alias = "ginkgo_aa0_650M")]
    GinkgoAa0_650M,
    #[serde(rename = "borzoi-human-fold0", alias = "borzoi_human_fold0")]
    BorzoiHumanFold0,
    #[serde(rename = "borzoi-dna", alias = "borzoi_dna")]
    BorzoiDna,
    #[serde(rename = "abdiffusion")]
    Abdiffusion,
    #[serde(rename = "lcdna")]
    Lcdna,
}

impl Model {
    pub const ALL: [Model; 8] = [
        Model::Esm2_650M,
        Model::Esm2_3B,
        Model::GinkgoMaskedlm3utrV1,
        Model::GinkgoAa0_650M,
        Model::BorzoiHumanFold0,
        Model::BorzoiDna,
        Model::Abdiffusion,
        Model::Lcdna,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Model::Esm2_650M => "esm2-650M",
            Model::Esm2_3B => "esm2-3B",
            Model::GinkgoMaskedlm3utrV1 => "ginkgo-maskedlm-3utr-v1",
            Model::GinkgoAa0_650M => "ginkgo-aa0-650M",
            Model::BorzoiHumanFold0 => "borzoi-human-fold0",
            Model::BorzoiDna => "borzoi-dna",
            Model::Abdiffusion => "abdiffusion",
            Model::Lcdna => "lcdna",
        }
    }

    /// Parse a model tag, accepting underscores in place of hyphens.
    pub fn parse(tag: &str) -> Option<Model> {
        let normalized = tag.trim().replace('_', "-");
        Model::ALL
            .into_iter()
            .find(|m| m.as_str() == normalized)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Defines a model family: the subset of [`Model`] a transform accepts.
macro_rules! model_family {
    ($(#[$meta:meta])* $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl From<$name> for Model {
            fn from(value: $name) -> Model {
                match value {
                    $($name::$variant => Model::$variant),+
                }
            }
        }

        impl $name {
            /// Narrow a model to this family, or `None` when the transform
            /// does not accept it.
            pub fn from_model(model: Model) -> Option<$name> {
                match model {
                    $(Model::$variant => Some($name::$variant),)+
                    #[allow(unreachable_patterns)]
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(Model::from(*self).as_str())
            }
        }
    };
}

model_family!(
    /// Protein language models priced per token (embedding, fill-mask).
    TokenModel {
        Esm2_650M,
        Esm2_3B,
        GinkgoMaskedlm3utrV1,
        GinkgoAa0_650M,
    }
);

model_family!(
    /// Genomic track models (promoter activity, tracks prediction).
    BorzoiModel { BorzoiHumanFold0, BorzoiDna }
);

model_family!(
    /// Diffusion models priced per denoising pass.
    DiffusionModel { Abdiffusion, Lcdna }
);

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub struct SequenceRequest {
    pub sequence: String,
    pub model: TokenModel,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PromoterActivityRequest {
    pub promoter_sequence: String,
    pub orf_sequence: String,
    /// Tissue name -> track identifiers, in caller order.
    pub tissue_of_interest: IndexMap<String, Vec<String>>,
    pub model: BorzoiModel,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TracksPredictionRequest {
    pub sequence: String,
    pub tracks: Vec<String>,
    pub model: BorzoiModel,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DiffusionRequest {
    pub sequence: String,
    /// Tokens revealed per denoising pass. Must be positive and finite.
    pub unmaskings_per_step: f64,
    pub model: DiffusionModel,
}

/// A request to price, keyed by transform.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRequest", into = "RawRequest")]
pub enum Request {
    Embedding(SequenceRequest),
    FillMask(SequenceRequest),
    PromoterActivity(PromoterActivityRequest),
    TracksPrediction(TracksPredictionRequest),
    DiffusionGenerate(DiffusionRequest),
    DiffusionUnmasking(DiffusionRequest),
}

impl Request {
    pub fn transform(&self) -> Transform {
        match self {
            Request::Embedding(_) => Transform::Embedding,
            Request::FillMask(_) => Transform::FillMask,
            Request::PromoterActivity(_) => Transform::PromoterActivity,
            Request::TracksPrediction(_) => Transform::TracksPrediction,
            Request::DiffusionGenerate(_) => Transform::DiffusionGenerate,
            Request::DiffusionUnmasking(_) => Transform::DiffusionUnmasking,
        }
    }

    pub fn model(&self) -> Model {
        match self {
            Request::Embedding(r) | Request::FillMask(r) => r.model.into(),
            Request::PromoterActivity(r) => r.model.into(),
            Request::TracksPrediction(r) => r.model.into(),
            Request::DiffusionGenerate(r) | Request::DiffusionUnmasking(r) => r.model.into(),
        }
    }

    /// Parse an untyped JSON request, validating that its fields match its
    /// `transform` tag.
    pub fn from_json(json: &str) -> PricingResult<Request> {
        let raw: RawRequest = serde_json::from_str(json)?;
        Request::try_from(raw)
    }
}

// ---------------------------------------------------------------------------
// Untyped edge
// ---------------------------------------------------------------------------

/// Flat wire form of a request, as produced by callers without a type system.
///
/// Fields not listed here are ignored. Fields that belong to a different
/// transform are rejected.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRequest {
    pub transform: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promoter_sequence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orf_sequence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tissue_of_interest: Option<IndexMap<String, Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracks: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unmaskings_per_step: Option<f64>,
}

impl RawRequest {
    fn present_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.sequence.is_some() {
            fields.push("sequence");
        }
        if self.promoter_sequence.is_some() {
            fields.push("promoter_sequence");
        }
        if self.orf_sequence.is_some() {
            fields.push("orf_sequence");
        }
        if self.tissue_of_interest.is_some() {
            fields.push("tissue_of_interest");
        }
        if self.tracks.is_some() {
            fields.push("tracks");
        }
        if self.unmaskings_per_step.is_some() {
            fields.push("unmaskings_per_step");
        }
        fields
    }
}

fn allowed_fields(transform: Transform) -> &'static [&'static str] {
    match transform {
        Transform::Embedding | Transform::FillMask => &["sequence"],
        Transform::PromoterActivity => {
            &["promoter_sequence", "orf_sequence", "tissue_of_interest"]
        }
        Transform::TracksPrediction => &["sequence", "tracks"],
        Transform::DiffusionGenerate | Transform::DiffusionUnmasking => {
            &["sequence", "unmaskings_per_step"]
        }
    }
}

fn required<T>(value: Option<T>, field: &str, transform: Transform) -> PricingResult<T> {
    value.ok_or_else(|| {
        PricingError::shape(format!("{transform} request is missing field `{field}`"))
    })
}

fn narrow<F>(
    model: Model,
    transform: Transform,
    family: fn(Model) -> Option<F>,
) -> PricingResult<F> {
    family(model).ok_or_else(|| PricingError::unrecognized(model.as_str(), transform))
}

pub(crate) fn validate_unmaskings(value: f64) -> PricingResult<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(PricingError::shape(format!(
            "unmaskings_per_step must be a positive number, got {value}"
        )))
    }
}

impl TryFrom<RawRequest> for Request {
    type Error = PricingError;

    fn try_from(raw: RawRequest) -> PricingResult<Request> {
        let transform = Transform::parse(&raw.transform).ok_or_else(|| {
            PricingError::shape(format!("unknown transform `{}`", raw.transform))
        })?;
        let model = Model::parse(&raw.model)
            .ok_or_else(|| PricingError::unrecognized(raw.model.trim(), transform))?;

        let allowed = allowed_fields(transform);
        let foreign: Vec<&str> = raw
            .present_fields()
            .into_iter()
            .filter(|field| !allowed.contains(field))
            .collect();
        if !foreign.is_empty() {
            return Err(PricingError::shape(format!(
                "{transform} request carries fields of another transform: {}",
                foreign.join(", ")
            )));
        }

        let request = match transform {
            Transform::Embedding | Transform::FillMask => {
                let payload = SequenceRequest {
                    sequence: required(raw.sequence, "sequence", transform)?,
                    model: narrow(model, transform, TokenModel::from_model)?,
                };
                if transform == Transform::Embedding {
                    Request::Embedding(payload)
                } else {
                    Request::FillMask(payload)
                }
            }
            Transform::PromoterActivity => {
                Request::PromoterActivity(PromoterActivityRequest {
                    promoter_sequence: required(
                        raw.promoter_sequence,
                        "promoter_sequence",
                        transform,
                    )?,
                    orf_sequence: required(raw.orf_sequence, "orf_sequence", transform)?,
                    tissue_of_interest: required(
                        raw.tissue_of_interest,
                        "tissue_of_interest",
                        transform,
                    )?,
                    model: narrow(model, transform, BorzoiModel::from_model)?,
                })
            }
            Transform::TracksPrediction => Request::TracksPrediction(TracksPredictionRequest {
                sequence: required(raw.sequence, "sequence", transform)?,
                tracks: required(raw.tracks, "tracks", transform)?,
                model: narrow(model, transform, BorzoiModel::from_model)?,
            }),
            Transform::DiffusionGenerate | Transform::DiffusionUnmasking => {
                let payload = DiffusionRequest {
                    sequence: required(raw.sequence, "sequence", transform)?,
                    unmaskings_per_step: validate_unmaskings(required(
                        raw.unmaskings_per_step,
                        "unmaskings_per_step",
                        transform,
                    )?)?,
                    model: narrow(model, transform, DiffusionModel::from_model)?,
                };
                if transform == Transform::DiffusionGenerate {
                    Request::DiffusionGenerate(payload)
                } else {
                    Request::DiffusionUnmasking(payload)
                }
            }
        };
        Ok(request)
    }
}

impl From<Request> for RawRequest {
    fn from(request: Request) -> RawRequest {
        let mut raw = RawRequest {
            transform: request.transform().as_str().to_string(),
            model: request.model().as_str().to_string(),
            ..RawRequest::default()
        };
        match request {
            Request::Embedding(r) | Request::FillMask(r) => {
                raw.sequence = Some(r.sequence);
            }
            Request::PromoterActivity(r) => {
                raw.promoter_sequence = Some(r.promoter_sequence);
                raw.orf_sequence = Some(r.orf_sequence);
                raw.tissue_of_interest = Some(r.tissue_of_interest);
            }
            Request::TracksPrediction(r) => {
                raw.sequence = Some(r.sequence);
                raw.tracks = Some(r.tracks);
            }
            Request::DiffusionGenerate(r) | Request::DiffusionUnmasking(r) => {
                raw.sequence = Some(r.sequence);
                raw.unmaskings_per_step = Some(r.unmaskings_per_step);
            }
        }
        raw
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_parse_accepts_legacy_generate() {
        assert_eq!(Transform::parse("GENERATE"), Some(Transform::DiffusionGenerate));
        assert_eq!(
            Transform::parse("DIFFUSION_UNMASKING"),
            Some(Transform::DiffusionUnmasking)
        );
        assert_eq!(Transform::parse("embedding"), None);
    }

    #[test]
    fn test_model_parse_underscore_spelling() {
        assert_eq!(Model::parse("borzoi_human_fold0"), Some(Model::BorzoiHumanFold0));
        assert_eq!(Model::parse("esm2-3B"), Some(Model::Esm2_3B));
        assert_eq!(Model::parse("esm3-open"), None);
    }

    #[test]
    fn test_family_narrowing() {
        assert_eq!(TokenModel::from_model(Model::Esm2_650M), Some(TokenModel::Esm2_650M));
        assert_eq!(TokenModel::from_model(Model::Lcdna), None);
        assert_eq!(DiffusionModel::from_model(Model::BorzoiDna), None);
        assert_eq!(Model::from(BorzoiModel::BorzoiDna), Model::BorzoiDna);
    }

    #[test]
    fn test_from_json_embedding() {
        let request = Request::from_json(
            r#"{"transform": "EMBEDDING", "model": "ginkgo-maskedlm-3utr-v1", "sequence": "ACD"}"#,
        )
        .unwrap();
        assert_eq!(request.transform(), Transform::Embedding);
        assert_eq!(request.model(), Model::GinkgoMaskedlm3utrV1);
    }

    #[test]
    fn test_from_json_promoter_keeps_tissue_order() {
        let request = Request::from_json(
            r#"{
                "transform": "PROMOTER_ACTIVITY",
                "model": "borzoi_human_fold0",
                "promoter_sequence": "GTCC",
                "orf_sequence": "tgcc",
                "tissue_of_interest": {"liver": ["CNhs10608+"], "heart": ["CNhs10612+"]}
            }"#,
        )
        .unwrap();
        match request {
            Request::PromoterActivity(r) => {
                let names: Vec<&str> = r.tissue_of_interest.keys().map(String::as_str).collect();
                assert_eq!(names, vec!["liver", "heart"]);
            }
            other => panic!("expected promoter activity, got {other:?}"),
        }
    }

    #[test]
    fn test_from_json_ignores_unrelated_extra_fields() {
        let request = Request::from_json(
            r#"{"transform": "GENERATE", "model": "abdiffusion", "sequence": "<mask>",
                "unmaskings_per_step": 1, "temperature": 1.0}"#,
        )
        .unwrap();
        assert_eq!(request.transform(), Transform::DiffusionGenerate);
    }

    #[test]
    fn test_from_json_missing_field() {
        let err = Request::from_json(
            r#"{"transform": "TRACKS_PREDICTION", "model": "borzoi-human-fold0", "sequence": "ACGT"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, PricingError::InvalidRequestShape(ref m) if m.contains("tracks")));
    }

    #[test]
    fn test_from_json_foreign_field() {
        let err = Request::from_json(
            r#"{"transform": "EMBEDDING", "model": "esm2-650M", "sequence": "ACD", "tracks": []}"#,
        )
        .unwrap_err();
        assert!(matches!(err, PricingError::InvalidRequestShape(_)));
    }

    #[test]
    fn test_from_json_unknown_transform() {
        let err = Request::from_json(r#"{"transform": "FOLD", "model": "esm2-650M"}"#).unwrap_err();
        assert!(matches!(err, PricingError::InvalidRequestShape(_)));
    }

    #[test]
    fn test_from_json_unknown_model() {
        let err = Request::from_json(
            r#"{"transform": "EMBEDDING", "model": "esm3-open", "sequence": "ACD"}"#,
        )
        .unwrap_err();
        match err {
            PricingError::UnrecognizedModel { model, transform } => {
                assert_eq!(model, "esm3-open");
                assert_eq!(transform, Transform::Embedding);
            }
            other => panic!("expected UnrecognizedModel, got {other:?}"),
        }
    }

    #[test]
    fn test_from_json_model_outside_family() {
        let err = Request::from_json(
            r#"{"transform": "DIFFUSION_GENERATE", "model": "esm2-650M",
                "sequence": "<mask>", "unmaskings_per_step": 1}"#,
        )
        .unwrap_err();
        assert!(matches!(err, PricingError::UnrecognizedModel { .. }));
    }

    #[test]
    fn test_from_json_rejects_zero_unmaskings() {
        let err = Request::from_json(
            r#"{"transform": "DIFFUSION_UNMASKING", "model": "lcdna",
                "sequence": "<mask>", "unmaskings_per_step": 0}"#,
        )
        .unwrap_err();
        assert!(matches!(err, PricingError::InvalidRequestShape(_)));
    }

    #[test]
    fn test_serialize_writes_active_variant_only() {
        let request = Request::TracksPrediction(TracksPredictionRequest {
            sequence: "ACGT".to_string(),
            tracks: vec!["CNhs10608+".to_string()],
            model: BorzoiModel::BorzoiHumanFold0,
        });
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["transform"], "TRACKS_PREDICTION");
        assert_eq!(value["model"], "borzoi-human-fold0");
        assert!(value.get("unmaskings_per_step").is_none());
        let back: Request = serde_json::from_value(value).unwrap();
        assert_eq!(back, request);
    }
}
