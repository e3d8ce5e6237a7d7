//! Domain entities for the tag registry.
//! Nothing in here knows about storage or HTTP.

pub mod batch;
pub mod ledger;
pub mod pet;

pub use batch::{BatchStatus, ManufacturingBatch, ShippingBatch};
pub use ledger::{
    BillingBatch, FeeAdjustment, ReplacementOrigin, ReplacementReason, TagReplacement,
    PENDING_IDENTIFIER,
};
pub use pet::{
    format_identifier, Owner, PaymentStatus, PetFilter, PetRecord, PetUpdate, TagStatus,
    UnknownVariant, UpdateOutcome,
};
