//! Director: the federation control plane
//!
//! The director is responsible for:
//! - Operator availability overrides on top of the static filter list
//! - The federation server listing
//! - Quorum object availability queries across origins
//!
//! Locks are always taken in the same order: the override registry first,
//! then the health map. Neither is held across a probe.

pub mod advertisement;
pub mod http;
pub mod listing;
pub mod overrides;
pub mod server;
pub mod stat;

pub use advertisement::{Advertisement, AdvertisementCache, AdvertisementSource, ServerType};
pub use listing::{FederationListingAssembler, ServerTypeFilter, ServerView};
pub use overrides::{DisabledReason, EffectiveAvailability, OverrideState, ServerOverrideRegistry};
pub use server::Director;
pub use stat::{
    HttpStatProbe, ObjectAvailabilityQuery, ObjectMetadata, QueryOutcome, QueryStatus, StatProbe,
};
