pub mod engine;
pub mod rate_card;

pub use engine::{compute_price, default_engine, PricingEngine};
pub use rate_card::{LengthTier, RateCard, RuleSet, TrackPricing};
