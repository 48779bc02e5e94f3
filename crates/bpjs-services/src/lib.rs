//! # bpjs-services
//!
//! Gateway workflows built on [`bpjs_client`]:
//!
//! - [`prescription`]: APOL prescription list, submission and deletion,
//!   with every submission recorded in a [`bpjs_audit::AuditLog`]
//! - [`control_visit`]: VClaim Rencana Kontrol search, insert, update and
//!   reference lists
//!
//! Every operation returns an [`ApiResult`]; nothing here panics or
//! returns a Rust error to the caller.

pub mod control_visit;
pub mod dates;
pub mod fields;
pub mod prescription;

pub use control_visit::ControlVisitService;
pub use prescription::{PrescriptionService, PrescriptionSettings};

use bpjs_client::{ApiResult, ClientError};

/// Result for a request that could not even be built.
pub(crate) fn encode_failure(operation: &str, err: ClientError) -> ApiResult {
    tracing::error!(operation, error = %err, "Failed to build upstream request");
    ApiResult::TransportError {
        message: format!("failed to build request: {err}"),
    }
}
