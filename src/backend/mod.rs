//! Backend module - inference trait and the Replicate client

pub mod replicate;
pub mod traits;

pub use replicate::ReplicateBackend;
pub use traits::{EditParameters, InferenceBackend, InferenceRequest};
