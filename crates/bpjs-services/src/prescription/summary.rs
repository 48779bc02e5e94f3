use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::fields::{scalar_f64, scalar_string};

/// Aggregate figures over a prescription list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PrescriptionSummary {
    pub total_resep: usize,
    pub total_obat: usize,
    pub total_biaya: f64,
    pub by_jenis_obat: BTreeMap<String, usize>,
    pub by_periode: Period,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Period {
    pub tanggal_mulai: String,
    pub tanggal_akhir: String,
}

/// Prescriptions inside a list payload: a bare array or `listsjp`.
pub fn prescriptions(payload: &Value) -> &[Value] {
    match payload {
        Value::Array(items) => items,
        Value::Object(map) => map
            .get("listsjp")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default(),
        _ => &[],
    }
}

pub fn summarize(payload: Option<&Value>, period: Period) -> PrescriptionSummary {
    let mut summary = PrescriptionSummary {
        by_periode: period,
        ..Default::default()
    };
    let Some(payload) = payload else {
        return summary;
    };

    for entry in prescriptions(payload) {
        summary.total_resep += 1;
        summary.total_obat += match entry.get("listobat") {
            Some(Value::Array(items)) => items.len(),
            Some(Value::Object(_)) => 1,
            _ => 0,
        };
        summary.total_biaya += entry.get("totalBiaya").and_then(scalar_f64).unwrap_or(0.0);

        let kind = entry
            .get("jenisObat")
            .and_then(scalar_string)
            .unwrap_or_else(|| "Unknown".into());
        *summary.by_jenis_obat.entry(kind).or_default() += 1;
    }
    summary
}
