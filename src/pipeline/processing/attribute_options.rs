use crate::app::ports::AttributeOptionStore;
use crate::error::Result;
use crate::types::{ItemCollection, Value};
use indexmap::IndexSet;
use std::collections::{BTreeMap, HashSet};
use tracing::{error, info};

/// Creates the attribute options items refer to but the catalog does not know yet.
pub struct AttributeOptionReconciler<'a> {
    store: &'a dyn AttributeOptionStore,
}

impl<'a> AttributeOptionReconciler<'a> {
    pub fn new(store: &'a dyn AttributeOptionStore) -> Self {
        Self { store }
    }

    /// Returns the number of options created per attribute code.
    pub fn reconcile(&self, items: &ItemCollection, codes: &[String]) -> Result<BTreeMap<String, usize>> {
        let mut created = BTreeMap::new();

        for code in codes {
            let wanted = collect_labels(items, code);
            let existing: HashSet<String> = self
                .store
                .list_options(code)?
                .into_iter()
                .map(|option| option.label)
                .collect();

            let missing: Vec<&String> = wanted.iter().filter(|label| !existing.contains(*label)).collect();
            for label in &missing {
                self.store.add_option(code, label)?;
            }

            if !missing.is_empty() {
                info!("Created {} options for attribute {}", missing.len(), code);
            }
            created.insert(code.clone(), missing.len());
        }

        Ok(created)
    }
}

/// Unique non-empty text values of `code`, in first-seen order.
fn collect_labels(items: &ItemCollection, code: &str) -> IndexSet<String> {
    let mut labels = IndexSet::new();
    for (identifier, item) in items {
        match item.get(code) {
            Some(Value::Text(label)) if !label.is_empty() => {
                labels.insert(label.clone());
            }
            Some(Value::List(_)) => {
                error!("Invalid value for attribute {} on {}: lists are not supported", code, identifier);
            }
            _ => {}
        }
    }
    labels
}
