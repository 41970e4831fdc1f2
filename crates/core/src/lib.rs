pub mod config;
pub mod domain;
pub mod errors;
pub mod pricing;
pub mod reliability;

pub use domain::mot::{
    normalize_registration, Defect, DefectType, MotTestRecord, OdometerUnit, TestResult,
    VehicleRecord,
};
pub use domain::vehicle::{FuelType, VehicleInput, VehicleProfile};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use pricing::addons::{AddOnKey, AddOnQuote, PaymentTerm};
pub use pricing::bundle::PricingTier;
pub use pricing::eligibility::{check_eligibility, EligibilityResult};
pub use pricing::payment::PaymentMethod;
pub use pricing::{
    DeterministicQuoteRuntime, PricingTrace, PricingTraceStep, QuoteOutcome, QuoteRequest,
    QuoteRuntime,
};
pub use reliability::{score_reliability, ReliabilityResult};
