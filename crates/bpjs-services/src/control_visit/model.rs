use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::fields::string_or_empty;

fn required(name: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{name} is required"));
    }
    Ok(())
}

/// Plan lookup by card number and SEP date.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlanSearch {
    #[serde(default)]
    pub no_kartu: String,
    #[serde(default)]
    pub tanggal_sep: String,
}

impl PlanSearch {
    pub fn validate(&self) -> Result<(), String> {
        required("no_kartu", &self.no_kartu)?;
        required("tanggal_sep", &self.tanggal_sep)
    }
}

/// Control plan as entered on the dashboard.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ControlPlan {
    #[serde(default)]
    pub no_sep: String,
    #[serde(default)]
    pub no_kartu: String,
    #[serde(default)]
    pub tanggal_rencana: String,
    #[serde(default)]
    pub poli_kontrol: String,
    #[serde(default)]
    pub dokter: String,
    #[serde(default)]
    pub user: String,
}

impl ControlPlan {
    pub fn validate(&self) -> Result<(), String> {
        required("no_sep", &self.no_sep)?;
        required("no_kartu", &self.no_kartu)?;
        required("tanggal_rencana", &self.tanggal_rencana)?;
        required("poli_kontrol", &self.poli_kontrol)?;
        required("dokter", &self.dokter)?;
        required("user", &self.user)
    }

    pub(crate) fn body(&self) -> PlanBody {
        PlanBody {
            sep_number: self.no_sep.trim().to_string(),
            card_number: self.no_kartu.trim().to_string(),
            planned_date: self.tanggal_rencana.trim().to_string(),
            poli: self.poli_kontrol.trim().to_string(),
            doctor: self.dokter.trim().to_string(),
            user: self.user.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct PlanBody {
    #[serde(rename = "noSEP")]
    pub sep_number: String,
    #[serde(rename = "noKartu")]
    pub card_number: String,
    #[serde(rename = "tglRencanaKontrol")]
    pub planned_date: String,
    #[serde(rename = "poliKontrol")]
    pub poli: String,
    #[serde(rename = "dokter")]
    pub doctor: String,
    pub user: String,
}

/// Doctor reference lookup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorQuery {
    #[serde(default, alias = "poli")]
    pub kode_poli: String,
    #[serde(default)]
    pub tanggal: String,
}

impl DoctorQuery {
    pub fn validate(&self) -> Result<(), String> {
        required("kode_poli", &self.kode_poli)?;
        required("tanggal", &self.tanggal)
    }
}

/// The plan lookup answers with one record or a list of them.
fn first_record(payload: &Value) -> Value {
    match payload {
        Value::Array(items) => items.first().cloned().unwrap_or(Value::Null),
        Value::Object(map) => match map.get("list") {
            Some(Value::Array(items)) => items.first().cloned().unwrap_or(Value::Null),
            _ => payload.clone(),
        },
        _ => Value::Null,
    }
}

pub fn plan_summary(payload: Value) -> Value {
    let record = first_record(&payload);
    json!({
        "no_kartu": string_or_empty(&record, "noKartu"),
        "nama_peserta": string_or_empty(&record, "nama"),
        "no_sep": string_or_empty(&record, "noSEP"),
        "tanggal_sep": string_or_empty(&record, "tglSEP"),
        "poli_asal": string_or_empty(&record, "poliAsal"),
        "diagnosa": string_or_empty(&record, "diagnosa"),
        "terapi": string_or_empty(&record, "terapi"),
    })
}

pub fn control_letter(payload: Value) -> Value {
    json!({
        "no_surat_kontrol": string_or_empty(&payload, "noSuratKontrol"),
        "tanggal_terbit": string_or_empty(&payload, "tglTerbitKontrol"),
        "tanggal_rencana": string_or_empty(&payload, "tglRencanaKontrol"),
        "poli_kontrol": string_or_empty(&payload, "namaPoliKontrol"),
        "dokter": string_or_empty(&payload, "namaDokter"),
    })
}

/// `[{kode, nama}]` or `{list: [...]}` as `[{code, name}]`.
pub fn reference_list(payload: Value) -> Value {
    let items = match &payload {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => map
            .get("list")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default(),
        _ => &[],
    };

    Value::Array(
        items
            .iter()
            .map(|item| {
                json!({
                    "code": string_or_empty(item, "kode"),
                    "name": string_or_empty(item, "nama"),
                })
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_list_shapes() {
        let bare = reference_list(json!([{"kode": "INT", "nama": "Penyakit Dalam"}]));
        let wrapped = reference_list(json!({"list": [{"kode": "INT", "nama": "Penyakit Dalam"}]}));
        assert_eq!(bare, wrapped);
        assert_eq!(bare[0]["code"], "INT");
        assert_eq!(reference_list(json!({"other": 1})), json!([]));
    }

    #[test]
    fn test_plan_summary_from_list() {
        let summary = plan_summary(json!({"list": [{
            "noKartu": "0001234567890",
            "nama": "BUDI",
            "noSEP": "0112R0010825V000123",
            "tglSEP": "2025-08-01",
            "poliAsal": "INT"
        }]}));
        assert_eq!(summary["nama_peserta"], "BUDI");
        assert_eq!(summary["poli_asal"], "INT");
        assert_eq!(summary["terapi"], "");
    }

    #[test]
    fn test_control_letter_mapping() {
        let letter = control_letter(json!({
            "noSuratKontrol": "0112R0010825K000045",
            "tglRencanaKontrol": "2025-08-20",
            "namaDokter": "dr. Sari"
        }));
        assert_eq!(letter["no_surat_kontrol"], "0112R0010825K000045");
        assert_eq!(letter["dokter"], "dr. Sari");
        assert_eq!(letter["tanggal_terbit"], "");
    }

    #[test]
    fn test_plan_body_keys() {
        let plan = ControlPlan {
            no_sep: "S1".into(),
            no_kartu: "K1".into(),
            tanggal_rencana: "2025-08-20".into(),
            poli_kontrol: "INT".into(),
            dokter: "123".into(),
            user: "admin".into(),
        };
        assert!(plan.validate().is_ok());
        let body = serde_json::to_value(plan.body()).unwrap();
        assert_eq!(body["noSEP"], "S1");
        assert_eq!(body["tglRencanaKontrol"], "2025-08-20");
        assert_eq!(body["poliKontrol"], "INT");

        let missing = ControlPlan {
            user: " ".into(),
            ..plan
        };
        assert_eq!(missing.validate().unwrap_err(), "user is required");
    }
}
