//! Field values and the `Record` trait structural predicates read through.

use core::cmp::Ordering;
use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use repokit_core::{EntityId, UserId};

use crate::error::EvaluationError;

/// A scalar (or list of scalars) read from an entity field or used as a
/// criterion operand.
///
/// Serialized untagged so filters read naturally as JSON
/// (`{"field": "zip_code", "op": "ne", "value": "30062"}`). JSON strings always
/// deserialize as `Text`; comparisons against `Uuid` / `Timestamp` values parse
/// the text on demand, so a UUID written as a string still matches.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Text(String),
    List(Vec<FieldValue>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Int(_) => "int",
            FieldValue::Float(_) => "float",
            FieldValue::Uuid(_) => "uuid",
            FieldValue::Timestamp(_) => "timestamp",
            FieldValue::Text(_) => "text",
            FieldValue::List(_) => "list",
        }
    }

    /// Compare two values the way a query predicate does.
    ///
    /// - `Ok(None)` when either side is null (and not both): comparisons
    ///   against null are never true, matching SQL three-valued logic.
    /// - `Err(TypeMismatch)` when the operands cannot be compared at all.
    pub fn compare(&self, other: &FieldValue, field: &str) -> Result<Option<Ordering>, EvaluationError> {
        use FieldValue::*;

        let ordering = match (self, other) {
            (Null, Null) => Some(Ordering::Equal),
            (Null, _) | (_, Null) => None,
            (Bool(a), Bool(b)) => Some(a.cmp(b)),
            (Int(a), Int(b)) => Some(a.cmp(b)),
            (Float(a), Float(b)) => a.partial_cmp(b),
            (Int(a), Float(b)) => (*a as f64).partial_cmp(b),
            (Float(a), Int(b)) => a.partial_cmp(&(*b as f64)),
            (Text(a), Text(b)) => Some(a.cmp(b)),
            (Uuid(a), Uuid(b)) => Some(a.cmp(b)),
            (Uuid(a), Text(b)) => Some(match parse_uuid(b) {
                Some(b) => a.cmp(&b),
                None => a.to_string().as_str().cmp(b.as_str()),
            }),
            (Text(_), Uuid(_)) => other.compare(self, field)?.map(Ordering::reverse),
            (Timestamp(a), Timestamp(b)) => Some(a.cmp(b)),
            (Timestamp(a), Text(b)) => Some(match parse_timestamp(b) {
                Some(b) => a.cmp(&b),
                None => a.to_rfc3339().as_str().cmp(b.as_str()),
            }),
            (Text(_), Timestamp(_)) => other.compare(self, field)?.map(Ordering::reverse),
            (a, b) => {
                return Err(EvaluationError::type_mismatch(
                    field,
                    format!("cannot compare {} with {}", a.type_name(), b.type_name()),
                ));
            }
        };
        Ok(ordering)
    }

    /// Total order used when sorting result sets in memory.
    ///
    /// Values order by type rank first (nulls first), then within the type.
    /// Numbers compare with `f64::total_cmp` (NaN after every other number),
    /// and an `Int` ties before an equal `Float`. Text is never coerced here.
    pub fn sort_cmp(&self, other: &FieldValue) -> Ordering {
        use FieldValue::*;

        self.rank().cmp(&other.rank()).then_with(|| match (self, other) {
            (Bool(a), Bool(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (Int(_) | Float(_), Int(_) | Float(_)) => {
                let (x, y) = (self.numeric_key(), other.numeric_key());
                x.0.total_cmp(&y.0).then(x.1.cmp(&y.1))
            }
            (Uuid(a), Uuid(b)) => a.cmp(b),
            (Timestamp(a), Timestamp(b)) => a.cmp(b),
            (Text(a), Text(b)) => a.cmp(b),
            (List(a), List(b)) => {
                for (x, y) in a.iter().zip(b) {
                    let ord = x.sort_cmp(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => Ordering::Equal,
        })
    }

    fn numeric_key(&self) -> (f64, u8) {
        match self {
            FieldValue::Int(i) => (*i as f64, 0),
            FieldValue::Float(x) => (*x, 1),
            _ => (0.0, 0),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            FieldValue::Null => 0,
            FieldValue::Bool(_) => 1,
            FieldValue::Int(_) | FieldValue::Float(_) => 2,
            FieldValue::Uuid(_) => 3,
            FieldValue::Timestamp(_) => 4,
            FieldValue::Text(_) => 5,
            FieldValue::List(_) => 6,
        }
    }

    /// Convert a JSON document node into a field value.
    ///
    /// Objects are not scalars and yield `None`.
    pub fn from_json(value: &JsonValue) -> Option<FieldValue> {
        match value {
            JsonValue::Null => Some(FieldValue::Null),
            JsonValue::Bool(b) => Some(FieldValue::Bool(*b)),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Some(FieldValue::Int(i)),
                None => n.as_f64().map(FieldValue::Float),
            },
            JsonValue::String(s) => Some(FieldValue::Text(s.clone())),
            JsonValue::Array(items) => items
                .iter()
                .map(FieldValue::from_json)
                .collect::<Option<Vec<_>>>()
                .map(FieldValue::List),
            JsonValue::Object(_) => None,
        }
    }
}

fn parse_uuid(s: &str) -> Option<Uuid> {
    Uuid::from_str(s).ok()
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|t| t.with_timezone(&Utc))
}

/// Wire shape of a value: JSON strings stay text.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<FieldValue>),
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match WireValue::deserialize(deserializer)? {
            WireValue::Null => FieldValue::Null,
            WireValue::Bool(b) => FieldValue::Bool(b),
            WireValue::Int(i) => FieldValue::Int(i),
            WireValue::Float(x) => FieldValue::Float(x),
            WireValue::Text(s) => FieldValue::Text(s),
            WireValue::List(items) => FieldValue::List(items),
        })
    }
}

impl core::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FieldValue::Null => f.write_str("null"),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Int(i) => write!(f, "{i}"),
            FieldValue::Float(x) => write!(f, "{x}"),
            FieldValue::Uuid(u) => write!(f, "{u}"),
            FieldValue::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
            FieldValue::Text(s) => write!(f, "{s:?}"),
            FieldValue::List(items) => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for FieldValue {
                fn from(value: $t) -> Self {
                    FieldValue::Int(i64::from(value))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<Uuid> for FieldValue {
    fn from(value: Uuid) -> Self {
        FieldValue::Uuid(value)
    }
}

impl From<EntityId> for FieldValue {
    fn from(value: EntityId) -> Self {
        FieldValue::Uuid(value.into())
    }
}

impl From<UserId> for FieldValue {
    fn from(value: UserId) -> Self {
        FieldValue::Uuid(value.into())
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(value)
    }
}

impl<V: Into<FieldValue>> From<Option<V>> for FieldValue {
    fn from(value: Option<V>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

impl<V: Into<FieldValue>> From<Vec<V>> for FieldValue {
    fn from(value: Vec<V>) -> Self {
        FieldValue::List(value.into_iter().map(Into::into).collect())
    }
}

/// Named-field access for structural predicates and field-based ordering.
///
/// Return `None` for names the type does not have; the evaluator reports that
/// as [`EvaluationError::UnknownField`].
pub trait Record {
    fn field(&self, name: &str) -> Option<FieldValue>;
}

/// JSON documents resolve dotted paths (`address.zip_code`). Missing keys in an
/// object read as null since documents are schemaless.
impl Record for JsonValue {
    fn field(&self, name: &str) -> Option<FieldValue> {
        let mut node = self;
        for segment in name.split('.') {
            match node {
                JsonValue::Object(map) => match map.get(segment) {
                    Some(next) => node = next,
                    None => return Some(FieldValue::Null),
                },
                _ => return None,
            }
        }
        FieldValue::from_json(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn int_and_float_compare_numerically() {
        let ord = FieldValue::Int(2).compare(&FieldValue::Float(2.5), "n").unwrap();
        assert_eq!(ord, Some(Ordering::Less));
    }

    #[test]
    fn null_comparisons_are_unknown() {
        assert_eq!(FieldValue::Null.compare(&FieldValue::Int(1), "n").unwrap(), None);
        assert_eq!(
            FieldValue::Null.compare(&FieldValue::Null, "n").unwrap(),
            Some(Ordering::Equal)
        );
    }

    #[test]
    fn incompatible_types_are_a_mismatch() {
        let err = FieldValue::Bool(true)
            .compare(&FieldValue::Text("x".into()), "flag")
            .unwrap_err();
        assert!(matches!(err, EvaluationError::TypeMismatch { ref field, .. } if field == "flag"));
    }

    #[test]
    fn uuid_text_coerces() {
        let id = Uuid::now_v7();
        let ord = FieldValue::Text(id.to_string())
            .compare(&FieldValue::Uuid(id), "id")
            .unwrap();
        assert_eq!(ord, Some(Ordering::Equal));
    }

    #[test]
    fn untagged_json_round_trip_keeps_variants() {
        let values: Vec<FieldValue> =
            serde_json::from_value(json!([null, true, 7, 1.5, "30062"])).unwrap();
        assert_eq!(
            values,
            vec![
                FieldValue::Null,
                FieldValue::Bool(true),
                FieldValue::Int(7),
                FieldValue::Float(1.5),
                FieldValue::Text("30062".into()),
            ]
        );
    }

    #[test]
    fn json_documents_resolve_dotted_paths() {
        let doc = json!({ "name": "Ada", "address": { "zip_code": "30062" } });
        assert_eq!(doc.field("address.zip_code"), Some(FieldValue::Text("30062".into())));
        assert_eq!(doc.field("missing"), Some(FieldValue::Null));
        assert_eq!(doc.field("name.first"), None);
        assert_eq!(doc.field("address"), None);
    }

    #[test]
    fn sort_cmp_puts_nulls_first() {
        let mut values = vec![FieldValue::Int(3), FieldValue::Null, FieldValue::Int(1)];
        values.sort_by(|a, b| a.sort_cmp(b));
        assert_eq!(values, vec![FieldValue::Null, FieldValue::Int(1), FieldValue::Int(3)]);
    }

    #[test]
    fn sort_cmp_is_a_total_order_with_nan_and_mixed_types() {
        let id = Uuid::now_v7();
        let mut values: Vec<FieldValue> = (0..40)
            .map(|i| match i % 6 {
                0 => FieldValue::Float(f64::NAN),
                1 => FieldValue::Float(f64::from(i) / 3.0),
                2 => FieldValue::Int(40 - i64::from(i)),
                3 => FieldValue::Text(id.to_string()),
                4 => FieldValue::Uuid(id),
                _ => FieldValue::Text(format!("code-{i}")),
            })
            .collect();
        values.push(FieldValue::Null);

        values.sort_by(|a, b| a.sort_cmp(b));

        assert_eq!(values[0], FieldValue::Null);
        let last_number = values.iter().rposition(|v| matches!(v, FieldValue::Int(_) | FieldValue::Float(_))).unwrap();
        assert!(matches!(values[last_number], FieldValue::Float(x) if x.is_nan()));
        let first_uuid = values.iter().position(|v| matches!(v, FieldValue::Uuid(_))).unwrap();
        let first_text = values.iter().position(|v| matches!(v, FieldValue::Text(_))).unwrap();
        assert!(first_uuid < first_text, "types sort by rank, text is not coerced");
    }

    #[test]
    fn equal_int_sorts_before_equal_float() {
        assert_eq!(FieldValue::Int(2).sort_cmp(&FieldValue::Float(2.0)), Ordering::Less);
        assert_eq!(FieldValue::Float(1.5).sort_cmp(&FieldValue::Int(2)), Ordering::Less);
    }

    #[test]
    fn unparseable_text_compares_with_uuid_as_text() {
        let id = Uuid::now_v7();
        let ord = FieldValue::Text("ABC-1".into())
            .compare(&FieldValue::Uuid(id), "code")
            .unwrap();
        assert_ne!(ord, Some(Ordering::Equal));

        let at = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let ord = FieldValue::Text("next tuesday".into())
            .compare(&FieldValue::Timestamp(at), "due")
            .unwrap();
        assert_ne!(ord, Some(Ordering::Equal));
    }

    #[test]
    fn json_strings_always_deserialize_as_text() {
        let values: Vec<FieldValue> = serde_json::from_value(json!([
            "550e8400-e29b-41d4-a716-446655440000",
            "2024-01-01T00:00:00Z"
        ]))
        .unwrap();
        assert_eq!(
            values,
            vec![
                FieldValue::Text("550e8400-e29b-41d4-a716-446655440000".into()),
                FieldValue::Text("2024-01-01T00:00:00Z".into()),
            ]
        );
    }

    fn any_value() -> impl Strategy<Value = FieldValue> {
        prop_oneof![
            Just(FieldValue::Null),
            any::<bool>().prop_map(FieldValue::Bool),
            (-3i64..3).prop_map(FieldValue::Int),
            prop_oneof![Just(f64::NAN), Just(f64::INFINITY), -3.0f64..3.0].prop_map(FieldValue::Float),
            "[a-c0-9-]{0,4}".prop_map(FieldValue::Text),
            Just(FieldValue::Uuid(Uuid::nil())),
        ]
    }

    proptest! {
        #[test]
        fn sort_cmp_is_antisymmetric_and_transitive(a in any_value(), b in any_value(), c in any_value()) {
            prop_assert_eq!(a.sort_cmp(&b), b.sort_cmp(&a).reverse());
            if a.sort_cmp(&b) != Ordering::Greater && b.sort_cmp(&c) != Ordering::Greater {
                prop_assert_ne!(a.sort_cmp(&c), Ordering::Greater);
            }
        }
    }
}
