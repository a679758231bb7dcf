use super::{Stage, StageReport};
use crate::constants;
use crate::error::{ImportError, Result};
use crate::pipeline::{process_each_item, PipelineContext};
use crate::types::{FieldValue, Item, Value};
use async_trait::async_trait;
use indexmap::IndexMap;
use tracing::info;

/// Rebuilds every item from an ordered field mapping
pub struct MapperStage {
    mapping: IndexMap<String, FieldValue>,
    required: Vec<String>,
    keep_unmapped: bool,
}

impl MapperStage {
    pub fn new(mapping: IndexMap<String, FieldValue>) -> Self {
        Self {
            mapping,
            required: Vec::new(),
            keep_unmapped: false,
        }
    }

    /// Fields that must be non-empty after mapping.
    pub fn with_required(mut self, required: Vec<String>) -> Self {
        self.required = required;
        self
    }

    /// Carry over source fields the mapping does not mention.
    pub fn keep_unmapped(mut self, keep: bool) -> Self {
        self.keep_unmapped = keep;
        self
    }

    pub fn map_item(&self, source: &Item) -> Result<Item> {
        let mut mapped = Item::new();

        for (field, rule) in &self.mapping {
            match rule {
                FieldValue::Literal(Value::Text(literal)) if literal == constants::FIELD_EMPTY => {
                    mapped.set(field.clone(), Value::Null);
                }
                FieldValue::Literal(value) => mapped.set(field.clone(), value.clone()),
                FieldValue::Computed(computed) => {
                    let value = computed.evaluate(source);
                    if !value.is_null() {
                        mapped.set(field.clone(), value);
                    }
                }
            }
        }

        if self.keep_unmapped {
            mapped.merge_missing(source.clone());
        }

        for field in &self.required {
            if mapped.get(field).map_or(true, Value::is_empty) {
                return Err(ImportError::MissingField(field.clone()));
            }
        }

        Ok(mapped)
    }
}

#[async_trait]
impl Stage for MapperStage {
    async fn process(&self, ctx: &mut PipelineContext) -> Result<StageReport> {
        let total = ctx.items.len();
        let removed = process_each_item(self.stage_name(), &mut ctx.items, |_, item| {
            *item = self.map_item(item)?;
            Ok(())
        });

        let message = format!("{} items mapped, {} removed", total - removed.len(), removed.len());
        info!("🗺️ {}", message);
        Ok(StageReport::success(self.stage_name(), total, message).with_removed(removed.len()))
    }

    fn stage_name(&self) -> &'static str {
        "mapper"
    }
}
