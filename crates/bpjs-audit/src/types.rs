use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::AuditError;

/// Last known delivery state of an audited submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    /// Recorded before the upstream answered
    Pending,
    /// Upstream accepted the submission
    Delivered,
    /// Upstream rejected the submission or could not be reached
    Failed,
    /// Deleted upstream after delivery
    Voided,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
            Self::Voided => "voided",
        }
    }

    /// Numeric code used by older dashboard tables.
    pub fn legacy_code(&self) -> i16 {
        match self {
            Self::Pending => 0,
            Self::Delivered => 1,
            Self::Failed | Self::Voided => 9,
        }
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditStatus {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "delivered" => Ok(Self::Delivered),
            "failed" => Ok(Self::Failed),
            "voided" => Ok(Self::Voided),
            other => Err(AuditError::invalid_input(format!("unknown audit status '{other}'"))),
        }
    }
}

/// Stored prescription header, one per visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrescriptionAudit {
    pub id: i64,
    pub visit_id: String,
    /// Upstream prescription reference (`noApotik`), known after delivery
    pub external_reference: Option<String>,
    pub prescription_number: String,
    pub origin_reference: String,
    pub poli_code: String,
    pub drug_type: String,
    pub doctor_code: String,
    pub iteration: i32,
    pub user_id: String,
    pub prescribed_at: Option<String>,
    pub served_at: Option<String>,
    pub status: AuditStatus,
    pub response_message: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Stored prescription line item, one per (visit, pharmacy reference).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItemAudit {
    pub id: i64,
    pub visit_id: String,
    /// Local pharmacy row the item was taken from
    pub pharmacy_ref: String,
    pub external_reference: Option<String>,
    pub prescription_number: String,
    pub drug_code: String,
    pub drug_name: String,
    pub compounded: bool,
    /// Compound type (`JNSROBT`), compounded items only
    pub compound_type: Option<String>,
    /// Requested compound quantity (`PERMINTAAN`), compounded items only
    pub requested_quantity: Option<f64>,
    pub quantity: f64,
    pub signa1: String,
    pub signa2: String,
    pub days_supply: i32,
    pub note: Option<String>,
    pub status: AuditStatus,
    pub response_message: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Values written by a header upsert.
///
/// `external_reference: None` keeps whatever is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderFields {
    pub external_reference: Option<String>,
    pub prescription_number: String,
    pub origin_reference: String,
    pub poli_code: String,
    pub drug_type: String,
    pub doctor_code: String,
    pub iteration: i32,
    pub user_id: String,
    pub prescribed_at: Option<String>,
    pub served_at: Option<String>,
    pub status: AuditStatus,
    pub response_message: Option<String>,
}

/// Values written by a line item upsert.
///
/// `external_reference: None` keeps whatever is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItemFields {
    pub external_reference: Option<String>,
    pub prescription_number: String,
    pub drug_code: String,
    pub drug_name: String,
    pub compounded: bool,
    pub compound_type: Option<String>,
    pub requested_quantity: Option<f64>,
    pub quantity: f64,
    pub signa1: String,
    pub signa2: String,
    pub days_supply: i32,
    pub note: Option<String>,
    pub status: AuditStatus,
    pub response_message: Option<String>,
}

/// Upsert outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct Upserted<T> {
    pub record: T,
    pub was_created: bool,
}

/// Rows to flip to [`AuditStatus::Voided`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoidSelector {
    /// The header carrying this upstream reference
    Prescription { external_reference: String },
    /// Items with this drug code under the header carrying this reference
    LineItem {
        external_reference: String,
        drug_code: String,
    },
}

impl fmt::Display for VoidSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prescription { external_reference } => {
                write!(f, "prescription {external_reference}")
            }
            Self::LineItem {
                external_reference,
                drug_code,
            } => write!(f, "drug {drug_code} of prescription {external_reference}"),
        }
    }
}
