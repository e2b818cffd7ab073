use rowshape_common::{Record, Value};

/// Lay records out as a header row followed by one row per record.
///
/// Headers default to the keys of the first record. Fields a record lacks are
/// `Null`.
pub fn convert_to_2d_array(data: &[Record], headers: Option<&[String]>) -> Vec<Vec<Value>> {
    let Some(first) = data.first() else {
        return Vec::new();
    };
    let headers: Vec<String> = match headers {
        Some(headers) => headers.to_vec(),
        None => first.keys().cloned().collect(),
    };

    let mut out = Vec::with_capacity(data.len() + 1);
    out.push(headers.iter().cloned().map(Value::String).collect());
    out.extend(data.iter().map(|row| {
        headers
            .iter()
            .map(|header| row.get(header).cloned().unwrap_or_default())
            .collect()
    }));
    out
}
