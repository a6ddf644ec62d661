pub mod catalogue;
pub mod estimator;
pub mod event_query;
pub mod event_recorder;
pub mod rate_sampler;
pub mod workspace_map;

pub use catalogue::CatalogueRepository;
pub use estimator::EstimatorRepository;
pub use event_query::{Aggregation, EventQueryFilter, EventQueryRepository};
pub use event_recorder::EventRecorderRepository;
pub use rate_sampler::{ingest_sample, RateSamplerRepository};
pub use workspace_map::WorkspaceMapRepository;
