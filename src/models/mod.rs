pub mod candidate;
pub mod loaders;
pub mod mime;
pub mod record;
pub mod session;

pub use candidate::{default_accepted_types, CandidateFile, QueueLimits};
pub use loaders::{load_all_manifests, load_manifest, BatchManifest};
pub use record::{
    EnrichmentOutcome, FileDescriptor, ProgressEvent, RecordPatch, UploadRecord, UploadStatus,
};
pub use session::UploadSession;
