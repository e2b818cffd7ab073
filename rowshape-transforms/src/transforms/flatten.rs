//! Expand array-valued fields into one row per index

use indexmap::IndexSet;
use rowshape_common::{Dataset, Record, Value};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::core::{Transform, TransformOutput};

/// Zips the array values of the target fields into separate rows.
///
/// Without explicit `fields`, every field holding an array in any row is a
/// target. A scalar in a target field lands in the first emitted row only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flatten {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
}

impl Flatten {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: Some(fields.into_iter().map(Into::into).collect()),
        }
    }

    fn targets(&self, data: &[Record]) -> IndexSet<String> {
        match &self.fields {
            Some(fields) => fields.iter().cloned().collect(),
            None => data
                .iter()
                .flat_map(|row| {
                    row.iter()
                        .filter(|(_, value)| value.is_array())
                        .map(|(key, _)| key.clone())
                })
                .collect(),
        }
    }

    #[tracing::instrument(skip_all)]
    pub fn run(&self, data: &[Record]) -> Dataset {
        let targets = self.targets(data);
        if targets.is_empty() {
            return data.to_vec();
        }

        let mut out = Vec::with_capacity(data.len());
        for row in data {
            let len = targets
                .iter()
                .filter_map(|field| row.get(field).and_then(Value::as_array))
                .map(<[Value]>::len)
                .max()
                .unwrap_or(1)
                .max(1);
            for i in 0..len {
                let expanded: Record = row
                    .iter()
                    .map(|(key, value)| {
                        let value = if !targets.contains(key) {
                            value.clone()
                        } else if let Some(items) = value.as_array() {
                            items.get(i).cloned().unwrap_or_default()
                        } else if i == 0 {
                            value.clone()
                        } else {
                            Value::Null
                        };
                        (key.clone(), value)
                    })
                    .collect();
                out.push(expanded);
            }
        }
        debug!(targets = targets.len(), rows_in = data.len(), rows_out = out.len(), "flattened rows");
        out
    }
}

impl Transform for Flatten {
    fn apply(&self, data: &[Record]) -> TransformOutput {
        TransformOutput::Data(self.run(data))
    }

    fn name(&self) -> &str {
        "flatten"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowshape_common::record;

    #[test]
    fn test_zips_arrays() {
        let data = vec![record! {"key" => "alpha", "foo" => vec![1, 2], "bar" => vec!["A", "B"]}];
        assert_eq!(
            Flatten::new().run(&data),
            vec![
                record! {"key" => "alpha", "foo" => 1, "bar" => "A"},
                record! {"key" => "alpha", "foo" => 2, "bar" => "B"},
            ]
        );
    }

    #[test]
    fn test_pads_shorter_arrays_and_scalars() {
        let data = vec![record! {"a" => vec![1, 2, 3], "b" => vec!["x"], "c" => "s"}];
        assert_eq!(
            Flatten::fields(["a", "b", "c"]).run(&data),
            vec![
                record! {"a" => 1, "b" => "x", "c" => "s"},
                record! {"a" => 2, "b" => Value::Null, "c" => Value::Null},
                record! {"a" => 3, "b" => Value::Null, "c" => Value::Null},
            ]
        );
    }

    #[test]
    fn test_empty_array_becomes_null() {
        let data = vec![record! {"k" => 1, "a" => Vec::<i32>::new()}];
        assert_eq!(
            Flatten::new().run(&data),
            vec![record! {"k" => 1, "a" => Value::Null}]
        );
    }

    #[test]
    fn test_detects_arrays_in_any_row() {
        let data = vec![
            record! {"id" => 1, "tags" => "solo"},
            record! {"id" => 2, "tags" => vec!["x", "y"]},
        ];
        assert_eq!(
            Flatten::new().run(&data),
            vec![
                record! {"id" => 1, "tags" => "solo"},
                record! {"id" => 2, "tags" => "x"},
                record! {"id" => 2, "tags" => "y"},
            ]
        );
    }

    #[test]
    fn test_no_arrays_is_identity() {
        let data = vec![record! {"a" => 1}, record! {"b" => "x"}];
        assert_eq!(Flatten::new().run(&data), data);
    }
}
