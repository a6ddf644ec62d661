//! Persistence layer for the usage accounting engine: connection
//! management, the Catalogue, WorkspaceMap, EventRecorder, RateSampler,
//! Estimator and EventQuery components, and catalogue seeding.

pub mod catalogue_seeder;
pub mod messages;
pub mod models;
pub mod repositories;
pub mod store;

pub use catalogue_seeder::seed_from_yaml;
pub use messages::{BillingEventMessage, ConsumptionRateSampleMessage, WorkspaceSettingsMessage};
pub use models::{
    BillingEvent, BillingEventWithSku, BillingItem, BillingItemPrice, RateSample, WorkspaceAccount,
};
pub use repositories::{
    ingest_sample, Aggregation, CatalogueRepository, EstimatorRepository, EventQueryFilter,
    EventQueryRepository, EventRecorderRepository, RateSamplerRepository, WorkspaceMapRepository,
};
pub use store::{classify_sqlx_error, Store};
