//! Dashboard-facing request types and the gateway bodies built from them.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::dates::format_upstream_datetime;
use crate::fields::{de_flag, de_opt_string, non_blank, scalar_f64, scalar_string};

const DATE_KINDS: &[&str] = &["TGLPELSJP", "TGLRSP"];
const DRUG_TYPES: &[&str] = &["0", "1", "2", "3"];
const DRUG_LINE_TYPES: &[&str] = &["N", "K"];

fn required(name: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{name} is required"));
    }
    Ok(())
}

/// Prescription list filter (`daftarresep`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrescriptionListQuery {
    /// Pharmacy provider code; the configured one is used when absent
    #[serde(default)]
    pub kdppk: Option<String>,
    #[serde(rename = "KdJnsObat", default, deserialize_with = "de_opt_string")]
    pub drug_type: Option<String>,
    #[serde(rename = "JnsTgl", default)]
    pub date_kind: String,
    #[serde(rename = "TglMulai", default)]
    pub start: String,
    #[serde(rename = "TglAkhir", default)]
    pub end: String,
}

impl PrescriptionListQuery {
    pub fn validate(&self) -> Result<(), String> {
        if !DATE_KINDS.contains(&self.date_kind.as_str()) {
            return Err("JnsTgl must be TGLPELSJP or TGLRSP".into());
        }
        required("TglMulai", &self.start)?;
        required("TglAkhir", &self.end)?;
        if let Some(kind) = non_blank(self.drug_type.as_deref())
            && !DRUG_TYPES.contains(&kind)
        {
            return Err("KdJnsObat must be one of 0, 1, 2, 3".into());
        }
        if let Some(ppk) = &self.kdppk
            && ppk.len() > 20
        {
            return Err("kdppk must be at most 20 characters".into());
        }
        Ok(())
    }

    pub(crate) fn body(&self, default_ppk: &str) -> ListBody {
        ListBody {
            kdppk: non_blank(self.kdppk.as_deref())
                .unwrap_or(default_ppk)
                .to_string(),
            drug_type: non_blank(self.drug_type.as_deref())
                .unwrap_or("0")
                .to_string(),
            date_kind: self.date_kind.clone(),
            start: format_upstream_datetime(&self.start),
            end: format_upstream_datetime(&self.end),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ListBody {
    pub kdppk: String,
    #[serde(rename = "KdJnsObat")]
    pub drug_type: String,
    #[serde(rename = "JnsTgl")]
    pub date_kind: String,
    #[serde(rename = "TglMulai")]
    pub start: String,
    #[serde(rename = "TglAkhir")]
    pub end: String,
}

/// Whole-prescription deletion (`hapusresep`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletePrescription {
    #[serde(default)]
    pub nosjp: String,
    #[serde(default)]
    pub refasalsjp: String,
    #[serde(default)]
    pub noresep: String,
}

impl DeletePrescription {
    pub fn validate(&self) -> Result<(), String> {
        required("nosjp", &self.nosjp)?;
        required("refasalsjp", &self.refasalsjp)?;
        required("noresep", &self.noresep)
    }

    /// Copy with surrounding whitespace removed from every identifier.
    pub fn trimmed(&self) -> Self {
        Self {
            nosjp: self.nosjp.trim().to_string(),
            refasalsjp: self.refasalsjp.trim().to_string(),
            noresep: self.noresep.trim().to_string(),
        }
    }
}

/// Single drug line deletion.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeleteDrug {
    #[serde(default, alias = "nosjp", alias = "nosep")]
    pub nosepapotek: String,
    #[serde(default)]
    pub noresep: String,
    #[serde(default, alias = "kdobat")]
    pub kodeobat: String,
    #[serde(default)]
    pub tipeobat: Option<String>,
}

impl DeleteDrug {
    pub fn validate(&self) -> Result<(), String> {
        required("nosepapotek", &self.nosepapotek)?;
        required("noresep", &self.noresep)?;
        required("kodeobat", &self.kodeobat)?;
        if !DRUG_LINE_TYPES.contains(&self.drug_line_type().as_str()) {
            return Err("tipeobat must be N or K".into());
        }
        Ok(())
    }

    /// `N` unless given, upper-cased.
    pub fn drug_line_type(&self) -> String {
        non_blank(self.tipeobat.as_deref())
            .unwrap_or("N")
            .to_uppercase()
    }

    pub(crate) fn body(&self) -> Value {
        json!({
            "nosepapotek": self.nosepapotek.trim(),
            "noresep": self.noresep.trim(),
            "kodeobat": self.kodeobat.trim(),
            "tipeobat": self.drug_line_type(),
        })
    }
}

/// New prescription with its line items, as sent by the pharmacy screen.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrescriptionSubmission {
    #[serde(rename = "KUNJUNGAN", default, deserialize_with = "de_opt_string")]
    pub visit_id: Option<String>,
    #[serde(rename = "TGLSJP", default)]
    pub sjp_date: Option<String>,
    #[serde(rename = "REFASALSJP", default, deserialize_with = "de_opt_string")]
    pub origin_reference: Option<String>,
    #[serde(rename = "POLIRSP", default, deserialize_with = "de_opt_string")]
    pub poli_code: Option<String>,
    #[serde(rename = "KDJNSOBAT", default, deserialize_with = "de_opt_string")]
    pub drug_type: Option<String>,
    #[serde(rename = "NORESEP", default, deserialize_with = "de_opt_string")]
    pub prescription_number: Option<String>,
    #[serde(rename = "IDUSERSJP", default, deserialize_with = "de_opt_string")]
    pub user_id: Option<String>,
    #[serde(rename = "TGLRSP", default)]
    pub prescribed_at: Option<String>,
    #[serde(rename = "TGLPELRSP", default)]
    pub served_at: Option<String>,
    #[serde(rename = "KdDokter", default, deserialize_with = "de_opt_string")]
    pub doctor_code: Option<String>,
    #[serde(rename = "iterasi", default, deserialize_with = "de_opt_string")]
    pub iteration: Option<String>,
    #[serde(rename = "DETAIL", default)]
    pub items: Vec<PrescriptionItem>,
}

impl PrescriptionSubmission {
    pub fn validate(&self) -> Result<(), String> {
        required("KUNJUNGAN", self.visit_id.as_deref().unwrap_or_default())?;
        required("NORESEP", self.prescription_number.as_deref().unwrap_or_default())?;
        for (index, item) in self.items.iter().enumerate() {
            if non_blank(item.pharmacy_ref.as_deref()).is_none() {
                return Err(format!("DETAIL[{index}].ID is required"));
            }
            if item.drug_code().is_empty() {
                return Err(format!("DETAIL[{index}].REFERENSI.DPHO.kodeobat is required"));
            }
        }
        Ok(())
    }

    pub fn visit_id(&self) -> &str {
        self.visit_id.as_deref().unwrap_or_default().trim()
    }

    /// Gateway header body; missing dates default to `now`.
    pub(crate) fn header_body(&self, now: &str) -> HeaderBody {
        let date = |value: &Option<String>| match non_blank(value.as_deref()) {
            Some(v) => format_upstream_datetime(v),
            None => now.to_string(),
        };
        let text = |value: &Option<String>, default: &str| {
            non_blank(value.as_deref()).unwrap_or(default).to_string()
        };

        HeaderBody {
            sjp_date: date(&self.sjp_date),
            origin_reference: text(&self.origin_reference, ""),
            poli_code: text(&self.poli_code, ""),
            drug_type: text(&self.drug_type, "1"),
            prescription_number: text(&self.prescription_number, ""),
            user_id: text(&self.user_id, ""),
            prescribed_at: date(&self.prescribed_at),
            served_at: date(&self.served_at),
            doctor_code: text(&self.doctor_code, "0"),
            iteration: text(&self.iteration, "0"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct HeaderBody {
    #[serde(rename = "TGLSJP")]
    pub sjp_date: String,
    #[serde(rename = "REFASALSJP")]
    pub origin_reference: String,
    #[serde(rename = "POLIRSP")]
    pub poli_code: String,
    #[serde(rename = "KDJNSOBAT")]
    pub drug_type: String,
    #[serde(rename = "NORESEP")]
    pub prescription_number: String,
    #[serde(rename = "IDUSERSJP")]
    pub user_id: String,
    #[serde(rename = "TGLRSP")]
    pub prescribed_at: String,
    #[serde(rename = "TGLPELRSP")]
    pub served_at: String,
    #[serde(rename = "KdDokter")]
    pub doctor_code: String,
    #[serde(rename = "iterasi")]
    pub iteration: String,
}

/// One drug line of a submission.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrescriptionItem {
    /// Local pharmacy row id
    #[serde(rename = "ID", default, deserialize_with = "de_opt_string")]
    pub pharmacy_ref: Option<String>,
    #[serde(rename = "RACIKAN", default, deserialize_with = "de_flag")]
    pub compounded: bool,
    #[serde(rename = "JUMLAH", default)]
    pub quantity: Option<Value>,
    #[serde(rename = "SIGNA1", default)]
    pub signa1: Option<Value>,
    #[serde(rename = "SIGNA2", default)]
    pub signa2: Option<Value>,
    #[serde(rename = "PERMINTAAN", default)]
    pub requested_quantity: Option<Value>,
    #[serde(rename = "REFERENSI", default)]
    pub reference: ItemReference,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemReference {
    #[serde(rename = "DPHO", default)]
    pub formulary: Option<FormularyDrug>,
    #[serde(rename = "FREKUENSIATURAN", default)]
    pub frequency: Option<Frequency>,
    #[serde(rename = "JNSROBT", default, deserialize_with = "de_opt_string")]
    pub compound_type: Option<String>,
}

/// National formulary (DPHO) entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormularyDrug {
    #[serde(default, deserialize_with = "de_opt_string")]
    pub kodeobat: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub namaobat: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Frequency {
    #[serde(rename = "SIGNA1", default)]
    pub signa1: Option<Value>,
    #[serde(rename = "SIGNA2", default)]
    pub signa2: Option<Value>,
}

impl PrescriptionItem {
    pub fn pharmacy_ref(&self) -> &str {
        self.pharmacy_ref.as_deref().unwrap_or_default().trim()
    }

    pub fn drug_code(&self) -> String {
        self.reference
            .formulary
            .as_ref()
            .and_then(|d| non_blank(d.kodeobat.as_deref()))
            .unwrap_or_default()
            .to_string()
    }

    pub fn drug_name(&self) -> String {
        self.reference
            .formulary
            .as_ref()
            .and_then(|d| d.namaobat.clone())
            .unwrap_or_default()
    }

    fn signa(own: &Option<Value>, fallback: Option<&Option<Value>>) -> Value {
        own.clone()
            .or_else(|| fallback.and_then(Clone::clone))
            .unwrap_or_else(|| json!(1))
    }

    pub fn signa1(&self) -> Value {
        Self::signa(&self.signa1, self.reference.frequency.as_ref().map(|f| &f.signa1))
    }

    pub fn signa2(&self) -> Value {
        Self::signa(&self.signa2, self.reference.frequency.as_ref().map(|f| &f.signa2))
    }

    pub fn quantity(&self) -> Value {
        self.quantity.clone().unwrap_or_else(|| json!(1))
    }

    pub fn requested_quantity(&self) -> Value {
        self.requested_quantity.clone().unwrap_or_else(|| json!(1))
    }

    /// `R.01` unless the reference names another compound type.
    pub fn compound_type(&self) -> String {
        non_blank(self.reference.compound_type.as_deref())
            .unwrap_or("R.01")
            .to_string()
    }

    pub(crate) fn body(&self, external_reference: &str, prescription_number: &str) -> ItemBody {
        ItemBody {
            external_reference: external_reference.to_string(),
            prescription_number: prescription_number.to_string(),
            drug_code: self.drug_code(),
            drug_name: self.drug_name(),
            signa1: self.signa1(),
            signa2: self.signa2(),
            quantity: self.quantity(),
            days_supply: 1,
            note: if self.compounded { "Racikan" } else { "Non Racikan" }.to_string(),
            compound_type: self.compounded.then(|| self.compound_type()),
            requested_quantity: self.compounded.then(|| self.requested_quantity()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ItemBody {
    #[serde(rename = "NOSJP")]
    pub external_reference: String,
    #[serde(rename = "NORESEP")]
    pub prescription_number: String,
    #[serde(rename = "KDOBT")]
    pub drug_code: String,
    #[serde(rename = "NMOBAT")]
    pub drug_name: String,
    #[serde(rename = "SIGNA1OBT")]
    pub signa1: Value,
    #[serde(rename = "SIGNA2OBT")]
    pub signa2: Value,
    #[serde(rename = "JMLOBT")]
    pub quantity: Value,
    #[serde(rename = "JHO")]
    pub days_supply: i32,
    #[serde(rename = "CatKhsObt")]
    pub note: String,
    #[serde(rename = "JNSROBT", skip_serializing_if = "Option::is_none")]
    pub compound_type: Option<String>,
    #[serde(rename = "PERMINTAAN", skip_serializing_if = "Option::is_none")]
    pub requested_quantity: Option<Value>,
}

impl ItemBody {
    pub fn quantity_f64(&self) -> f64 {
        scalar_f64(&self.quantity).unwrap_or(0.0)
    }

    pub fn requested_quantity_f64(&self) -> Option<f64> {
        self.requested_quantity.as_ref().and_then(scalar_f64)
    }

    pub fn signa_strings(&self) -> (String, String) {
        (
            scalar_string(&self.signa1).unwrap_or_default(),
            scalar_string(&self.signa2).unwrap_or_default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission() -> PrescriptionSubmission {
        serde_json::from_value(json!({
            "KUNJUNGAN": "2508170001",
            "REFASALSJP": "0112R0010825V000001",
            "POLIRSP": "INT",
            "NORESEP": "R0001",
            "IDUSERSJP": "apoteker",
            "TGLRSP": "2025-08-17T09:00",
            "DETAIL": [
                {
                    "ID": 501,
                    "RACIKAN": 1,
                    "JUMLAH": 10,
                    "PERMINTAAN": 20,
                    "REFERENSI": {
                        "DPHO": {"kodeobat": "RAC001", "namaobat": "Puyer"},
                        "FREKUENSIATURAN": {"SIGNA1": 3, "SIGNA2": 1}
                    }
                },
                {
                    "ID": "502",
                    "RACIKAN": "0",
                    "SIGNA1": "2",
                    "REFERENSI": {"DPHO": {"kodeobat": "NON001", "namaobat": "Amoxicillin"}}
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_header_defaults() {
        let body = submission().header_body("2025-08-17 10:00:00");
        assert_eq!(body.drug_type, "1");
        assert_eq!(body.doctor_code, "0");
        assert_eq!(body.iteration, "0");
        assert_eq!(body.prescribed_at, "2025-08-17 09:00:00");
        assert_eq!(body.sjp_date, "2025-08-17 10:00:00");
    }

    #[test]
    fn test_compounded_item_body_has_compound_fields() {
        let s = submission();
        let body = serde_json::to_value(s.items[0].body("0112A01708250000001", "R0001")).unwrap();
        assert_eq!(body["JNSROBT"], "R.01");
        assert_eq!(body["PERMINTAAN"], 20);
        assert_eq!(body["SIGNA1OBT"], 3);
        assert_eq!(body["CatKhsObt"], "Racikan");
        assert_eq!(body["JHO"], 1);
    }

    #[test]
    fn test_plain_item_body_omits_compound_fields() {
        let s = submission();
        let body = serde_json::to_value(s.items[1].body("0112A01708250000001", "R0001")).unwrap();
        assert!(body.get("JNSROBT").is_none());
        assert!(body.get("PERMINTAAN").is_none());
        assert_eq!(body["SIGNA1OBT"], "2");
        assert_eq!(body["SIGNA2OBT"], 1);
        assert_eq!(body["JMLOBT"], 1);
        assert_eq!(body["CatKhsObt"], "Non Racikan");
    }

    #[test]
    fn test_submission_validation() {
        assert!(submission().validate().is_ok());
        let mut missing_visit = submission();
        missing_visit.visit_id = None;
        assert!(missing_visit.validate().is_err());
        let mut missing_ref = submission();
        missing_ref.items[1].pharmacy_ref = Some(" ".into());
        assert_eq!(missing_ref.validate().unwrap_err(), "DETAIL[1].ID is required");
    }

    #[test]
    fn test_delete_drug_aliases_and_type() {
        let req: DeleteDrug = serde_json::from_value(json!({
            "nosjp": "0112A01708250000001",
            "noresep": "R0001",
            "kdobat": "NON001",
            "tipeobat": "k"
        }))
        .unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.body()["tipeobat"], "K");
        assert_eq!(req.body()["nosepapotek"], "0112A01708250000001");

        let bad = DeleteDrug {
            tipeobat: Some("x".into()),
            ..req
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_delete_prescription_trimmed() {
        let req = DeletePrescription {
            nosjp: " 0112A01708250000001 ".into(),
            refasalsjp: "0112R0010825V000001\n".into(),
            noresep: "  R0001".into(),
        };
        let body = serde_json::to_value(req.trimmed()).unwrap();
        assert_eq!(
            body,
            json!({"nosjp": "0112A01708250000001", "refasalsjp": "0112R0010825V000001", "noresep": "R0001"})
        );
    }

    #[test]
    fn test_list_query_validation_and_defaults() {
        let query: PrescriptionListQuery = serde_json::from_value(json!({
            "JnsTgl": "TGLRSP",
            "TglMulai": "2025-08-01",
            "TglAkhir": "2025-08-17T23:59"
        }))
        .unwrap();
        assert!(query.validate().is_ok());
        let body = query.body("0112A017");
        assert_eq!(body.kdppk, "0112A017");
        assert_eq!(body.drug_type, "0");
        assert_eq!(body.start, "2025-08-01 00:00:00");
        assert_eq!(body.end, "2025-08-17 23:59:00");

        let bad = PrescriptionListQuery {
            date_kind: "TGLX".into(),
            ..query
        };
        assert!(bad.validate().is_err());
    }
}
