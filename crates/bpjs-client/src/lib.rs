//! # bpjs-client
//!
//! Client plumbing for the BPJS gateways used by the pharmacy (APOL) and
//! control-visit (VClaim Rencana Kontrol) workflows.
//!
//! ## Overview
//!
//! - [`signer`] builds the `X-cons-id` / `X-timestamp` / `X-signature` header set.
//! - [`envelope`] decrypts and decompresses the encrypted `response` field.
//! - [`normalizer`] turns any raw response into one [`ApiResult`] variant.
//! - [`transport`] sends signed requests with the configured [`RetryPolicy`].
//! - [`orchestrator`] tries an ordered list of request strategies until one
//!   succeeds.
//!
//! ## Example
//!
//! ```ignore
//! use bpjs_client::{ApiClient, ApiResult, CredentialSet, OutboundRequest};
//!
//! async fn list(client: &ApiClient) {
//!     let request = OutboundRequest::get("/referensi/poli");
//!     match client.execute("poli-list", request).await {
//!         ApiResult::Success { payload, .. } => println!("{payload}"),
//!         ApiResult::Empty { reason, .. } => println!("no data: {reason}"),
//!         ApiResult::UpstreamError { code, message, .. } => eprintln!("{code}: {message}"),
//!         ApiResult::TransportError { message } => eprintln!("transport: {message}"),
//!     }
//! }
//! ```

pub mod client;
pub mod credentials;
pub mod envelope;
pub mod error;
pub mod normalizer;
pub mod orchestrator;
pub mod result;
pub mod retry;
pub mod signer;
pub mod transport;

pub use client::ApiClient;
pub use credentials::CredentialSet;
pub use envelope::{decode_envelope, derive_key_and_iv, encode_envelope};
pub use error::{ClientError, CodecError, EnvelopeDecodeError, EnvelopeStage, TransportError};
pub use normalizer::{Normalizer, RawResponse};
pub use orchestrator::{Attempt, Orchestrated, Orchestrator, Strategy};
pub use result::{ApiResult, EmptyPolicy, MetaData};
pub use retry::RetryPolicy;
pub use signer::{SignedRequest, sign, timestamp};
pub use reqwest::Method;
pub use transport::{Body, Exchange, HttpTransport, OutboundRequest};
