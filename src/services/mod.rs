pub mod authenticator;
pub mod extractor;
pub mod paginator;
pub mod uploader;

pub use authenticator::{AuthOutcome, Authenticator};
pub use extractor::Extractor;
pub use paginator::{PaginationOutcome, Paginator, TerminationReason};
pub use uploader::{BatchUploader, ChunkOutcome, ChunkReport, RetryPolicy, UploadReport};
