//! Structured-data claims.
//!
//! [`ExistingClaimSet`] is the read-only view of a file's current
//! statements, deserialized from the repository's mediainfo `statements`
//! JSON. New claims are described by [`ClaimDescriptor`] and rendered to the
//! same statement JSON for submission by the caller.

pub mod rules;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::catalog::PartialDate;
use crate::error::Result;

pub use rules::ClaimStatus;

/// Property ids of the target claim store.
pub mod property {
    pub const LICENSE: &str = "P275";
    pub const COPYRIGHT_STATUS: &str = "P6216";
    pub const COLLECTION: &str = "P195";
    pub const INCEPTION: &str = "P571";
    /// Catalog record id.
    pub const CATALOG_ID: &str = "P9478";
    /// National gallery artwork id.
    pub const GALLERY_ARTWORK_ID: &str = "P9834";
    pub const SOURCE_OF_FILE: &str = "P7482";
    pub const DESCRIBED_AT_URL: &str = "P973";
    pub const OPERATOR: &str = "P137";
    pub const PUBLISHER: &str = "P123";
    pub const REFERENCE_URL: &str = "P854";
    pub const MIME_TYPE: &str = "P1163";
}

/// "File available on the internet", the source-of-file target.
pub const FILE_AVAILABLE_ON_INTERNET: &str = "Q74228490";

/// Proleptic Gregorian calendar model.
pub const GREGORIAN_CALENDAR: &str = "http://www.wikidata.org/entity/Q1985727";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snak {
    #[serde(default = "value_snaktype")]
    pub snaktype: String,
    pub property: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datavalue: Option<DataValue>,
}

fn value_snaktype() -> String {
    "value".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataValue {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: Value,
}

impl Snak {
    /// Item id of an entity-valued snak.
    pub fn item_id(&self) -> Option<String> {
        let value = &self.datavalue.as_ref()?.value;
        if let Some(id) = value.get("id").and_then(Value::as_str) {
            return Some(id.to_string());
        }
        value
            .get("numeric-id")
            .and_then(Value::as_u64)
            .map(|n| format!("Q{n}"))
    }

    pub fn string_value(&self) -> Option<&str> {
        self.datavalue.as_ref()?.value.as_str()
    }

    /// Time string of a time-valued snak, e.g. `+1930-00-00T00:00:00Z`.
    pub fn time_value(&self) -> Option<&str> {
        self.datavalue.as_ref()?.value.get("time")?.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Reference {
    #[serde(default)]
    pub snaks: BTreeMap<String, Vec<Snak>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub mainsnak: Snak,
    #[serde(default, deserialize_with = "map_or_empty_list")]
    pub qualifiers: BTreeMap<String, Vec<Snak>>,
    #[serde(default)]
    pub references: Vec<Reference>,
}

impl Statement {
    pub fn qualifier_snaks(&self, property: &str) -> &[Snak] {
        self.qualifiers.get(property).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn has_item_qualifier(&self, property: &str, item: &str) -> bool {
        self.qualifier_snaks(property)
            .iter()
            .any(|snak| snak.item_id().as_deref() == Some(item))
    }

    pub fn has_string_qualifier(&self, property: &str, value: &str) -> bool {
        self.qualifier_snaks(property)
            .iter()
            .any(|snak| snak.string_value() == Some(value))
    }

    /// Whether any reference carries `property` with string `value`.
    pub fn has_reference(&self, property: &str, value: &str) -> bool {
        self.references.iter().any(|reference| {
            reference
                .snaks
                .get(property)
                .is_some_and(|snaks| snaks.iter().any(|s| s.string_value() == Some(value)))
        })
    }
}

/// Current statements of one file, keyed by property.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExistingClaimSet {
    #[serde(deserialize_with = "map_or_empty_list")]
    statements: BTreeMap<String, Vec<Statement>>,
}

impl ExistingClaimSet {
    /// Parse mediainfo `statements` JSON. An empty entity serializes its
    /// statements as `[]`, which is accepted as "no statements".
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn statements(&self, property: &str) -> &[Statement] {
        self.statements.get(property).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn has_property(&self, property: &str) -> bool {
        !self.statements(property).is_empty()
    }

    /// Item ids targeted by `property` claims.
    pub fn item_targets(&self, property: &str) -> Vec<String> {
        self.statements(property)
            .iter()
            .filter_map(|s| s.mainsnak.item_id())
            .collect()
    }

    /// String values of `property` claims.
    pub fn string_targets(&self, property: &str) -> Vec<&str> {
        self.statements(property)
            .iter()
            .filter_map(|s| s.mainsnak.string_value())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.values().all(Vec::is_empty)
    }
}

fn map_or_empty_list<'de, D, T>(deserializer: D) -> std::result::Result<BTreeMap<String, T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MapOrList<T> {
        Map(BTreeMap<String, T>),
        List(Vec<Value>),
    }

    match MapOrList::<T>::deserialize(deserializer)? {
        MapOrList::Map(map) => Ok(map),
        MapOrList::List(list) if list.is_empty() => Ok(BTreeMap::new()),
        MapOrList::List(_) => Err(serde::de::Error::custom(
            "expected an object keyed by property",
        )),
    }
}

/// Value of a snak in a new claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ClaimValue {
    Item(String),
    String(String),
    Time(PartialDate),
}

impl ClaimValue {
    fn datavalue(&self) -> Value {
        match self {
            Self::Item(id) => {
                let mut value = Map::new();
                value.insert("entity-type".into(), json!("item"));
                if let Ok(numeric) = id.trim_start_matches('Q').parse::<u64>() {
                    value.insert("numeric-id".into(), json!(numeric));
                }
                value.insert("id".into(), json!(id));
                json!({ "value": value, "type": "wikibase-entityid" })
            }
            Self::String(text) => json!({ "value": text, "type": "string" }),
            Self::Time(date) => json!({
                "value": {
                    "time": date.to_wikibase_time(),
                    "timezone": 0,
                    "before": 0,
                    "after": 0,
                    "precision": date.precision(),
                    "calendarmodel": GREGORIAN_CALENDAR,
                },
                "type": "time",
            }),
        }
    }
}

/// A claim to be added: main value plus qualifiers and one reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimDescriptor {
    pub property: String,
    pub value: ClaimValue,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub qualifiers: Vec<(String, ClaimValue)>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<(String, ClaimValue)>,
}

impl ClaimDescriptor {
    pub fn new(property: &str, value: ClaimValue) -> Self {
        Self {
            property: property.to_string(),
            value,
            qualifiers: Vec::new(),
            references: Vec::new(),
        }
    }

    pub fn with_qualifier(mut self, property: &str, value: ClaimValue) -> Self {
        self.qualifiers.push((property.to_string(), value));
        self
    }

    pub fn with_reference(mut self, property: &str, value: ClaimValue) -> Self {
        self.references.push((property.to_string(), value));
        self
    }

    /// Reference URL pointing at the catalog record.
    pub fn with_reference_url(self, url: &str) -> Self {
        self.with_reference(property::REFERENCE_URL, ClaimValue::String(url.to_string()))
    }

    /// Statement JSON as accepted by the repository's entity edit API.
    pub fn to_wikibase_json(&self) -> Value {
        let mut statement = json!({
            "mainsnak": snak_json(&self.property, &self.value),
            "type": "statement",
            "rank": "normal",
        });

        if !self.qualifiers.is_empty() {
            let (snaks, order) = group_snaks(&self.qualifiers);
            statement["qualifiers"] = snaks;
            statement["qualifiers-order"] = order;
        }
        if !self.references.is_empty() {
            let (snaks, order) = group_snaks(&self.references);
            statement["references"] = json!([{ "snaks": snaks, "snaks-order": order }]);
        }
        statement
    }
}

fn snak_json(property: &str, value: &ClaimValue) -> Value {
    json!({
        "snaktype": "value",
        "property": property,
        "datavalue": value.datavalue(),
    })
}

fn group_snaks(snaks: &[(String, ClaimValue)]) -> (Value, Value) {
    let mut grouped = Map::new();
    let mut order = Vec::new();
    for (property, value) in snaks {
        if !grouped.contains_key(property) {
            order.push(json!(property));
        }
        let entry = grouped
            .entry(property.clone())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(list) = entry {
            list.push(snak_json(property, value));
        }
    }
    (Value::Object(grouped), Value::Array(order))
}
