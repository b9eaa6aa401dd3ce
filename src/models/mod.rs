pub mod credentials;
pub mod record;

pub use credentials::Credentials;
pub use record::{PageResult, Record, SessionCursor, UploadEnvelope, UploadEntry};
