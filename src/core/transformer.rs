use crate::core::normalizers::{
    combine_date_time, is_numeric_field, normalize_date, normalize_time, parse_numeric_field,
};
use crate::domain::model::{
    FieldValue, NdjsonRecord, NormalizedRecord, OutputMode, OutputRecord, RawRow, UnifiedSchema,
};
use crate::utils::error::RowError;
use std::collections::BTreeMap;

pub const DATE_FIELD: &str = "data";
pub const TIME_FIELD: &str = "hora";
pub const STATUS_FIELD: &str = "situacao";

/// Older exports call the accident type `natureza_acidente`.
pub const TIPO_SYNONYMS: [&str; 2] = ["tipo", "natureza_acidente"];

/// Keys lifted out of the raw row in NDJSON mode; everything else goes to `meta`.
pub const NDJSON_CONSUMED_KEYS: [&str; 5] =
    [DATE_FIELD, TIME_FIELD, STATUS_FIELD, TIPO_SYNONYMS[0], TIPO_SYNONYMS[1]];

/// Spreads a raw row over the unified schema and normalizes date, time and count fields.
///
/// Columns this file lacks become `""`. A value that falls back to its neutral
/// default is reported but never drops the row.
pub fn transform_row(raw: &RawRow, schema: &UnifiedSchema, line: u64) -> NormalizedRecord {
    let mut fields = BTreeMap::new();

    for key in schema.columns() {
        let value = raw.get(key).map(String::as_str).unwrap_or("");
        fields.insert(key.clone(), normalize_field(key, value, line));
    }

    NormalizedRecord { fields }
}

fn normalize_field(key: &str, value: &str, line: u64) -> FieldValue {
    let has_value = !value.trim().is_empty();

    if key == DATE_FIELD {
        let date = normalize_date(value);
        if date.is_empty() && has_value {
            tracing::warn!("⚠️ line {}: unparseable date {:?}, left empty", line, value);
        }
        return FieldValue::Text(date);
    }

    if key == TIME_FIELD {
        let time = normalize_time(value);
        if time.is_empty() && has_value {
            tracing::warn!("⚠️ line {}: unparseable time {:?}, left empty", line, value);
        }
        return FieldValue::Text(time);
    }

    if is_numeric_field(key) {
        let number = parse_numeric_field(value);
        let parsed = value.trim().replace(',', ".").parse::<f64>();
        if has_value && !parsed.map(f64::is_finite).unwrap_or(false) {
            tracing::warn!(
                "⚠️ line {}: non-numeric value {:?} in '{}', using 0",
                line,
                value,
                key
            );
        }
        return FieldValue::Number(number);
    }

    FieldValue::Text(value.to_string())
}

fn first_non_empty<'a>(raw: &'a RawRow, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| raw.get(*key))
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
}

/// Builds the fixed four-field NDJSON shape. A row without a date is rejected.
pub fn transform_ndjson_row(raw: &RawRow, line: u64) -> Result<NdjsonRecord, RowError> {
    let raw_date = raw
        .get(DATE_FIELD)
        .map(|d| d.trim())
        .filter(|d| !d.is_empty())
        .ok_or(RowError::MissingField {
            line,
            field: DATE_FIELD,
        })?;

    let tipo = match first_non_empty(raw, &TIPO_SYNONYMS) {
        Some(tipo) => tipo.to_string(),
        None => {
            tracing::warn!(
                "⚠️ line {}: no accident type in any of {:?}",
                line,
                TIPO_SYNONYMS
            );
            String::new()
        }
    };

    let normalized = normalize_date(raw_date);
    let date = if normalized.is_empty() {
        raw_date.to_string()
    } else {
        normalized
    };
    let time = raw
        .get(TIME_FIELD)
        .map(String::as_str)
        .filter(|t| !t.trim().is_empty());

    let residual: BTreeMap<&str, &str> = raw
        .iter()
        .filter(|(key, _)| !NDJSON_CONSUMED_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect();
    let meta = serde_json::to_string(&residual).map_err(|source| RowError::Meta { line, source })?;

    Ok(NdjsonRecord {
        tipo,
        situacao: raw.get(STATUS_FIELD).cloned().unwrap_or_default(),
        datahora: combine_date_time(&date, time),
        meta,
        latitude: None,
        longitude: None,
    })
}

/// One transformer per batch: the mode and the shared read-only schema.
#[derive(Debug, Clone)]
pub struct RowTransformer {
    mode: OutputMode,
    schema: UnifiedSchema,
}

impl RowTransformer {
    pub fn new(mode: OutputMode, schema: UnifiedSchema) -> Self {
        Self { mode, schema }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn schema(&self) -> &UnifiedSchema {
        &self.schema
    }

    pub fn transform(&self, raw: &RawRow, line: u64) -> Result<OutputRecord, RowError> {
        match self.mode {
            OutputMode::Unified => Ok(OutputRecord::Unified(transform_row(raw, &self.schema, line))),
            OutputMode::Ndjson => transform_ndjson_row(raw, line).map(OutputRecord::Ndjson),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::logger::capture_warnings;

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_transform_row_fills_missing_columns() {
        let schema = UnifiedSchema::from_columns(["data", "hora", "situacao", "tipo"]);
        let raw = row(&[("data", "01/03/2024"), ("hora", "14:5"), ("tipo", "Colisão")]);

        let record = transform_row(&raw, &schema, 2);

        assert_eq!(record.fields.len(), schema.len());
        assert_eq!(record.get("data").unwrap().as_text(), Some("2024-03-01"));
        assert_eq!(record.get("hora").unwrap().as_text(), Some("14:05:00"));
        assert_eq!(record.get("tipo").unwrap().as_text(), Some("Colisão"));
        assert_eq!(record.get("situacao").unwrap().as_text(), Some(""));
    }

    #[test]
    fn test_transform_row_coerces_counts_and_keeps_bad_rows() {
        let schema = UnifiedSchema::from_columns(["bairro", "data", "num_semaforo", "vitimas"]);
        let raw = row(&[
            ("bairro", "BOA VIAGEM"),
            ("data", "não informado"),
            ("vitimas", "dois"),
            ("num_semaforo", "12,0"),
            ("extra", "ignored"),
        ]);

        let record = transform_row(&raw, &schema, 9);

        assert_eq!(record.fields.len(), 4);
        assert_eq!(record.get("data").unwrap().as_text(), Some(""));
        assert_eq!(record.get("vitimas").unwrap().as_number(), Some(0.0));
        assert_eq!(record.get("num_semaforo").unwrap().as_number(), Some(12.0));
        assert_eq!(record.get("bairro").unwrap().as_text(), Some("BOA VIAGEM"));
        assert!(record.get("extra").is_none());
    }

    #[test]
    fn test_non_numeric_count_is_reported() {
        let schema = UnifiedSchema::from_columns(["vitimas", "moto"]);
        let raw = row(&[("vitimas", "dois"), ("moto", "1")]);

        let (record, warnings) = capture_warnings(|| transform_row(&raw, &schema, 12));

        assert_eq!(record.get("vitimas").unwrap().as_number(), Some(0.0));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("line 12"));
        assert!(warnings[0].contains("vitimas"));
    }

    #[test]
    fn test_ndjson_row_shape() {
        let raw = row(&[
            ("data", "2024-03-01"),
            ("hora", "14:30:00"),
            ("natureza_acidente", "COM VÍTIMA"),
            ("situacao", "FINALIZADA"),
            ("bairro", "IBURA"),
            ("vitimas", "1"),
        ]);

        let record = transform_ndjson_row(&raw, 2).unwrap();

        assert_eq!(record.tipo, "COM VÍTIMA");
        assert_eq!(record.situacao, "FINALIZADA");
        assert_eq!(record.datahora, "2024-03-01T14:30:00-03:00");
        let meta: serde_json::Value = serde_json::from_str(&record.meta).unwrap();
        assert_eq!(meta, serde_json::json!({"bairro": "IBURA", "vitimas": "1"}));
    }

    #[test]
    fn test_ndjson_tipo_prefers_first_synonym() {
        let raw = row(&[
            ("data", "01/03/2024"),
            ("tipo", "  "),
            ("natureza_acidente", "SEM VÍTIMA"),
        ]);
        let record = transform_ndjson_row(&raw, 3).unwrap();
        assert_eq!(record.tipo, "SEM VÍTIMA");
        assert_eq!(record.datahora, "2024-03-01T00:00:00-03:00");
        assert_eq!(record.situacao, "");
    }

    #[test]
    fn test_ndjson_missing_tipo_does_not_block_row() {
        let raw = row(&[("data", "2024-03-01"), ("hora", "25:00:00")]);
        let record = transform_ndjson_row(&raw, 4).unwrap();
        assert_eq!(record.tipo, "");
        assert_eq!(record.datahora, "2024-03-01T00:00:00-03:00");
        assert_eq!(record.meta, "{}");
    }

    #[test]
    fn test_ndjson_missing_date_is_row_error() {
        let raw = row(&[("tipo", "ATROPELAMENTO"), ("data", " ")]);
        let err = transform_ndjson_row(&raw, 5).unwrap_err();
        assert!(matches!(err, RowError::MissingField { line: 5, field: "data" }));
    }

    #[test]
    fn test_row_transformer_dispatches_by_mode() {
        let schema = UnifiedSchema::from_columns(["data"]);
        let raw = row(&[("data", "2024-03-02")]);

        let unified = RowTransformer::new(OutputMode::Unified, schema.clone());
        assert!(matches!(unified.transform(&raw, 2), Ok(OutputRecord::Unified(_))));

        let ndjson = RowTransformer::new(OutputMode::Ndjson, schema);
        assert!(matches!(ndjson.transform(&raw, 2), Ok(OutputRecord::Ndjson(_))));
        assert!(ndjson.transform(&RawRow::new(), 3).is_err());
    }
}
