//! Normalization of the drug-service list (`pelayanan/obat/daftar`).
//!
//! The gateway puts `listobat` at the root or under `detailsep`, as a single
//! object or an array, with inconsistent key spellings. Callers always get
//! one array in both places.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::fields::{first_string, scalar_string};

const CODE_ALIASES: &[&str] = &["kodeobat", "kdobat", "KdObat", "KDOBAT", "kd_obat"];
const TYPE_ALIASES: &[&str] = &["tipeobat", "tipeObat", "tipe_obat"];

pub fn normalize_drug_list(payload: Value) -> Value {
    let Value::Object(mut root) = payload else {
        return payload;
    };

    let from_detail = root
        .get("detailsep")
        .and_then(|detail| detail.get("listobat"))
        .map(entries)
        .unwrap_or_default();
    let from_root = root.get("listobat").map(entries).unwrap_or_default();

    let merged = Value::Array(dedupe_by_code(from_detail.into_iter().chain(from_root)));

    root.insert("listobat".into(), merged.clone());
    let detail = root
        .entry("detailsep")
        .or_insert_with(|| Value::Object(Map::new()));
    if !detail.is_object() {
        *detail = Value::Object(Map::new());
    }
    if let Value::Object(detail) = detail {
        detail.insert("listobat".into(), merged);
    }

    Value::Object(root)
}

/// A list value as normalized entries; a lone drug object counts as one.
fn entries(list: &Value) -> Vec<Value> {
    match list {
        Value::Array(items) => items.iter().filter(|i| i.is_object()).map(normalize_entry).collect(),
        Value::Object(_) if first_string(list, CODE_ALIASES).is_some() => vec![normalize_entry(list)],
        _ => Vec::new(),
    }
}

fn normalize_entry(item: &Value) -> Value {
    let mut entry = item.clone();
    let code = first_string(item, CODE_ALIASES).unwrap_or_default();
    let kind = first_string(item, TYPE_ALIASES)
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| "N".into())
        .to_uppercase();
    let price = item.get("harga").and_then(scalar_string).unwrap_or_default();

    if let Value::Object(map) = &mut entry {
        map.insert("kodeobat".into(), Value::String(code));
        map.insert("tipeobat".into(), Value::String(kind));
        map.insert("harga".into(), Value::String(price));
    }
    entry
}

/// Keeps first-seen order; a later entry with the same code replaces it.
fn dedupe_by_code(items: impl Iterator<Item = Value>) -> Vec<Value> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<Value> = Vec::new();

    for item in items {
        let code = item
            .get("kodeobat")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        match positions.get(&code) {
            Some(&index) => out[index] = item,
            None => {
                positions.insert(code, out.len());
                out.push(item);
            }
        }
    }
    out
}
