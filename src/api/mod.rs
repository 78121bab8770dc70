//! REST plumbing: transport, shared client, wire envelope and errors.

pub mod client;
pub mod envelope;
pub mod error;
pub mod transport;

pub use client::ApiClient;
pub use envelope::Envelope;
pub use error::ApiError;
pub use transport::ReqwestTransport;
