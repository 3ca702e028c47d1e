use crate::domain::model::{Coordinates, FieldValue, OutputRecord, RawRow};
use crate::domain::ports::Geocoder;

pub const STREET_FIELD: &str = "endereco";
pub const NUMBER_FIELD: &str = "numero";
pub const COMPLEMENT_FIELD: &str = "complemento";
pub const CROSS_STREET_FIELD: &str = "endereco_cruzamento";
pub const NEIGHBORHOOD_FIELD: &str = "bairro";

pub const LATITUDE_COLUMN: &str = "latitude";
pub const LONGITUDE_COLUMN: &str = "longitude";

fn field<'a>(raw: &'a RawRow, key: &str) -> Option<&'a str> {
    raw.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// Search string from the address sub-fields. `None` when the row has no street.
///
/// Precedence: street + number, street + complement, "street com cross-street",
/// then street alone; the neighborhood and locality are appended when present.
pub fn build_search_address(raw: &RawRow, locality: Option<&str>) -> Option<String> {
    let street = field(raw, STREET_FIELD)?;

    let head = if let Some(number) = field(raw, NUMBER_FIELD) {
        format!("{}, {}", street, number)
    } else if let Some(complement) = field(raw, COMPLEMENT_FIELD) {
        format!("{}, {}", street, complement)
    } else if let Some(cross) = field(raw, CROSS_STREET_FIELD) {
        format!("{} com {}", street, cross)
    } else {
        street.to_string()
    };

    let mut parts = vec![head];
    parts.extend(field(raw, NEIGHBORHOOD_FIELD).map(str::to_string));
    parts.extend(
        locality
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string),
    );

    Some(parts.join(", "))
}

/// Looks up the row's address. Rows without a street are not sent to the geocoder.
pub async fn resolve_coordinates(
    geocoder: &dyn Geocoder,
    raw: &RawRow,
    locality: Option<&str>,
) -> Coordinates {
    match build_search_address(raw, locality) {
        Some(address) => geocoder.geocode(&address).await,
        None => Coordinates::unresolved(),
    }
}

/// Writes coordinates into an already transformed record.
///
/// An unresolved value never replaces a non-empty latitude/longitude from the source row.
pub fn attach_coordinates(record: &mut OutputRecord, coordinates: Coordinates) {
    match record {
        OutputRecord::Unified(normalized) => {
            for (column, value) in [
                (LATITUDE_COLUMN, coordinates.latitude),
                (LONGITUDE_COLUMN, coordinates.longitude),
            ] {
                match value {
                    Some(number) => {
                        normalized
                            .fields
                            .insert(column.to_string(), FieldValue::Number(number));
                    }
                    None => {
                        normalized
                            .fields
                            .entry(column.to_string())
                            .or_insert_with(|| FieldValue::Text(String::new()));
                    }
                }
            }
        }
        OutputRecord::Ndjson(ndjson) => {
            ndjson.latitude = Some(coordinates.latitude);
            ndjson.longitude = Some(coordinates.longitude);
        }
    }
}
