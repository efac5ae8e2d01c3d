pub mod client;
pub mod error;
pub mod sources;
pub mod types;

pub use client::NemoClient;
pub use error::NemoError;
pub use sources::{ModelSource, RemoteDiagnostics, RemoteJobSource};
