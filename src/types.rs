use crate::constants;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single field value on an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Text(String),
    List(Vec<String>),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for null, empty text and empty lists.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            Value::List(values) => values.is_empty(),
        }
    }

    /// Flat string form used for import rows and codec lines.
    pub fn to_flat_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Text(s) => s.clone(),
            Value::List(values) => values.join(","),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

/// One product record: field name to value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Item {
    fields: BTreeMap<String, Value>,
}

impl Item {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_text)
    }

    /// Text value that is present and non-empty.
    pub fn non_empty_text(&self, field: &str) -> Option<&str> {
        self.text(field).filter(|s| !s.is_empty())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Adds the fields of `other` that this item does not have yet.
    pub fn merge_missing(&mut self, other: Item) {
        for (field, value) in other.fields {
            self.fields.entry(field).or_insert(value);
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn fields_mut(&mut self) -> impl Iterator<Item = (&String, &mut Value)> {
        self.fields.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Items are online unless `product_online` parses to zero or less.
    pub fn is_online(&self) -> bool {
        match self.text(constants::PRODUCT_ONLINE) {
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .map(|v| v > 0.0)
                .unwrap_or(true),
            None => true,
        }
    }

    pub fn is_configurable(&self) -> bool {
        self.text(constants::PRODUCT_TYPE) == Some(constants::TYPE_CONFIGURABLE)
    }

    /// Flattens the item into an import row.
    pub fn to_row(&self) -> Row {
        self.fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_flat_string()))
            .collect()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Item {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Item::from_pairs(iter)
    }
}

/// A flat string-valued row handed to the import engine
pub type Row = BTreeMap<String, String>;

/// The shared, insertion-ordered keyed collection every stage works on
pub type ItemCollection = IndexMap<String, Item>;

/// Value assigned to a field by a template: a literal or a computation over the item
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Computed(Computed),
    Literal(Value),
}

impl FieldValue {
    pub fn literal(value: impl Into<Value>) -> Self {
        FieldValue::Literal(value.into())
    }

    pub fn resolve(&self, item: &Item) -> Value {
        match self {
            FieldValue::Literal(value) => value.clone(),
            FieldValue::Computed(computed) => computed.evaluate(item),
        }
    }
}

/// Built-in computations, resolved once when a stage is constructed
#[derive(Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Computed {
    /// Value of another field
    Copy(String),
    /// Non-empty values of several fields joined with `,`
    Concat(Vec<String>),
    /// Text with `{field}` placeholders replaced by field values
    Template(String),
    #[serde(skip)]
    Custom(fn(&Item) -> Value),
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Computed::Copy(field) => f.debug_tuple("Copy").field(field).finish(),
            Computed::Concat(fields) => f.debug_tuple("Concat").field(fields).finish(),
            Computed::Template(template) => f.debug_tuple("Template").field(template).finish(),
            Computed::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("valid placeholder regex"));

impl Computed {
    pub fn evaluate(&self, item: &Item) -> Value {
        match self {
            Computed::Copy(field) => item.get(field).cloned().unwrap_or(Value::Null),
            Computed::Concat(fields) => {
                let parts: Vec<String> = fields
                    .iter()
                    .filter_map(|f| item.get(f))
                    .map(Value::to_flat_string)
                    .filter(|s| !s.is_empty())
                    .collect();
                Value::Text(parts.join(","))
            }
            Computed::Template(template) => {
                let rendered = PLACEHOLDER.replace_all(template, |caps: &regex::Captures| {
                    item.get(&caps[1])
                        .map(Value::to_flat_string)
                        .unwrap_or_default()
                });
                Value::Text(rendered.into_owned())
            }
            Computed::Custom(f) => f(item),
        }
    }
}

/// Applies a field template to an item in declaration order.
pub fn apply_template(item: &mut Item, template: &IndexMap<String, FieldValue>) {
    for (field, rule) in template {
        let value = rule.resolve(item);
        item.set(field.clone(), value);
    }
}
