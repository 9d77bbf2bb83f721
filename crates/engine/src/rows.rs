use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::ops::Index;

/// One decoded row. Columns keep the order of the response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(Map<String, Value>);

impl Row {
    pub fn new(columns: Map<String, Value>) -> Self {
        Self(columns)
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    /// Attribute-style access: a missing column is an error, not `null`.
    pub fn field(&self, column: &str) -> Result<&Value> {
        self.get(column)
            .ok_or_else(|| Error::MissingColumn(column.to_string()))
    }

    pub fn value_at(&self, index: usize) -> Option<&Value> {
        self.0.values().nth(index)
    }

    pub fn get_as<T: DeserializeOwned>(&self, column: &str) -> Result<T> {
        let value = self.field(column)?.clone();
        serde_json::from_value(value).map_err(|source| Error::Decode {
            context: format!("column {column:?}"),
            source,
        })
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Row {
    fn from(columns: Map<String, Value>) -> Self {
        Self(columns)
    }
}

/// # Panics
///
/// Panics if the column is absent; use [`Row::get`] or [`Row::field`] to probe.
impl Index<&str> for Row {
    type Output = Value;

    fn index(&self, column: &str) -> &Value {
        match self.get(column) {
            Some(value) => value,
            None => panic!("no column named {column:?}"),
        }
    }
}

/// # Panics
///
/// Panics if `index` is out of range.
impl Index<usize> for Row {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        match self.value_at(index) {
            Some(value) => value,
            None => panic!("column index {index} out of range for {} columns", self.len()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Payload {
    Many(Vec<Row>),
    One(Row),
}

/// Rows returned by one statement. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    rows: Vec<Row>,
    last_insert_id: Option<Value>,
}

impl ResultSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            last_insert_id: None,
        }
    }

    /// One row with one column, used for counts and the last insert id.
    pub fn single(column: &str, value: Value) -> Self {
        let mut columns = Map::new();
        columns.insert(column.to_string(), value);
        Self::from_rows(vec![Row(columns)])
    }

    /// Decode a response body: an array of objects, a single object, or
    /// nothing at all (`204 No Content`).
    pub fn from_json(table: &str, body: &str) -> Result<Self> {
        if body.trim().is_empty() {
            return Ok(Self::empty());
        }
        let payload = serde_json::from_str::<Option<Payload>>(body).map_err(|source| {
            Error::Decode {
                context: format!("response from {table}"),
                source,
            }
        })?;
        Ok(match payload {
            None => Self::empty(),
            Some(Payload::Many(rows)) => Self::from_rows(rows),
            Some(Payload::One(row)) => Self::from_rows(vec![row]),
        })
    }

    pub(crate) fn with_last_insert_id(mut self, id: Option<Value>) -> Self {
        self.last_insert_id = id;
        self
    }

    pub fn fetch_one(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn fetch_all(&self) -> &[Row] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Primary key of the inserted row, for results of an INSERT.
    pub fn last_insert_id(&self) -> Option<&Value> {
        self.last_insert_id.as_ref()
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

impl Serialize for ResultSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.rows.serialize(serializer)
    }
}

impl IntoIterator for ResultSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_array_object_and_empty_bodies() {
        let body = r#"[{"id":1,"brand":"Kia"},{"id":2,"brand":"BYD"}]"#;
        let rows = ResultSet::from_json("cars", body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.fetch_one().unwrap()["brand"], json!("Kia"));

        let rows = ResultSet::from_json("cars", r#"{"id":7}"#).unwrap();
        assert_eq!(rows.len(), 1);

        assert!(ResultSet::from_json("cars", "").unwrap().is_empty());
        assert!(ResultSet::from_json("cars", "null").unwrap().is_empty());
        assert!(ResultSet::from_json("cars", "[]").unwrap().fetch_one().is_none());
    }

    #[test]
    fn rejects_non_json_bodies() {
        let err = ResultSet::from_json("cars", "<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn row_access_by_name_and_position() {
        let body = r#"[{"id":3,"price":9990000,"plate":null}]"#;
        let rows = ResultSet::from_json("cars", body).unwrap();
        let row = rows.fetch_one().unwrap();
        assert_eq!(row["id"], json!(3));
        assert_eq!(row[1], json!(9990000));
        assert_eq!(row.field("plate").unwrap(), &Value::Null);
        assert!(matches!(row.field("color"), Err(Error::MissingColumn(c)) if c == "color"));
        assert_eq!(row.get_as::<u64>("price").unwrap(), 9990000);
        assert_eq!(row.get_as::<Option<String>>("plate").unwrap(), None);
        assert!(matches!(row.get_as::<String>("id"), Err(Error::Decode { .. })));
        assert_eq!(row.columns().collect::<Vec<_>>(), ["id", "price", "plate"]);
    }

    #[test]
    fn serializes_as_array_of_objects() {
        let rows = ResultSet::single("COUNT(*)", json!(4));
        assert_eq!(
            serde_json::to_value(&rows).unwrap(),
            json!([{"COUNT(*)": 4}])
        );
        let ids: Vec<&Value> = rows.iter().map(|row| &row[0]).collect();
        assert_eq!(ids, [&json!(4)]);
    }
}
