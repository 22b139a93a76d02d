pub mod enrichment;
pub mod failure_writer;
pub mod stats;
pub mod validator;

pub use enrichment::{
    Enricher, EnrichmentError, EnrichmentRequest, EnrichmentResponse, LlmEnricher,
    UnavailableEnricher,
};
pub use failure_writer::FailureWriter;
pub use stats::UploadStats;
pub use validator::RejectReason;
