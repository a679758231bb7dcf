use crate::codec::{LineCodec, VariationLine};
use crate::constants;
use crate::types::{apply_template, FieldValue, Item, ItemCollection, Value};
use indexmap::IndexMap;
use metrics::counter;
use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info, warn};

/// Decides which parents an item joins and what distinguishes it from its siblings.
pub trait GroupingStrategy: Send + Sync {
    /// Parent identifiers the item contributes to; empty keeps it a simple item.
    fn parent_ids(&self, item: &Item) -> Vec<String>;

    /// Fields that vary between the children of `parent_id`.
    fn variation_attributes(&self, item: &Item, parent_id: &str) -> Vec<String>;

    /// Key used to split one parent into independent siblings.
    fn split_key(&self, _item: &Item) -> Option<String> {
        None
    }
}

/// Field-driven grouping used by profile configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FieldGrouping {
    /// Field holding the parent identifier
    pub parent_field: String,
    /// Splits `parent_field` into several parent ids when set
    #[serde(default)]
    pub parent_separator: Option<String>,
    pub variation_attributes: Vec<String>,
    #[serde(default)]
    pub split_on: Option<String>,
}

impl GroupingStrategy for FieldGrouping {
    fn parent_ids(&self, item: &Item) -> Vec<String> {
        let raw: Vec<String> = match item.get(&self.parent_field) {
            Some(Value::List(values)) => values.clone(),
            Some(value) => {
                let flat = value.to_flat_string();
                match &self.parent_separator {
                    Some(separator) if !separator.is_empty() => {
                        flat.split(separator.as_str()).map(str::to_string).collect()
                    }
                    _ => vec![flat],
                }
            }
            None => Vec::new(),
        };

        let mut seen = HashSet::new();
        raw.into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty() && seen.insert(id.clone()))
            .collect()
    }

    fn variation_attributes(&self, _item: &Item, _parent_id: &str) -> Vec<String> {
        self.variation_attributes.clone()
    }

    fn split_key(&self, item: &Item) -> Option<String> {
        self.split_on.as_ref().map(|field| {
            item.get(field)
                .map(|value| value.to_flat_string())
                .unwrap_or_default()
        })
    }
}

/// Counts produced by one grouping run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupingReport {
    /// Distinct parent ids with at least one eligible child
    pub potential_groups: usize,
    /// Extra parents introduced by splitting, before filtering
    pub split_groups: usize,
    /// Parents written to the collection
    pub created_groups: usize,
    /// Children referenced by a written parent
    pub grouped_children: usize,
}

struct Member {
    identifier: String,
    split_key: String,
    line: VariationLine,
}

#[derive(Default)]
struct PendingGroup {
    members: Vec<Member>,
    removed_attributes: BTreeSet<String>,
}

/// Builds configurable parents out of simple items.
pub struct VariantGrouper {
    strategy: Box<dyn GroupingStrategy>,
    parent_template: IndexMap<String, FieldValue>,
    child_overrides: IndexMap<String, FieldValue>,
    filter_degenerate: bool,
    codec: LineCodec,
}

impl VariantGrouper {
    pub fn new(strategy: Box<dyn GroupingStrategy>) -> Self {
        Self {
            strategy,
            parent_template: IndexMap::new(),
            child_overrides: IndexMap::new(),
            filter_degenerate: true,
            codec: LineCodec::new(),
        }
    }

    pub fn with_parent_template(mut self, template: IndexMap<String, FieldValue>) -> Self {
        self.parent_template = template;
        self
    }

    pub fn with_child_overrides(mut self, overrides: IndexMap<String, FieldValue>) -> Self {
        self.child_overrides = overrides;
        self
    }

    /// Keep parents that end up with a single child.
    pub fn with_filter_degenerate(mut self, filter: bool) -> Self {
        self.filter_degenerate = filter;
        self
    }

    pub fn group(&self, items: &mut ItemCollection) -> GroupingReport {
        let mut report = GroupingReport::default();
        let (groups, skipped_parents) = self.collect(items);
        report.potential_groups = groups.len();

        for parent_id in skipped_parents.iter().filter(|id| !groups.contains_key(*id)) {
            info!("No active children for configurable {}, parent not created", parent_id);
        }

        let mut parents: Vec<(String, Item)> = Vec::new();
        let mut children: Vec<String> = Vec::new();

        for (parent_id, group) in groups {
            let partitions = self.split(group.members);
            report.split_groups += partitions.len().saturating_sub(1);

            let surviving: Vec<Vec<Member>> = partitions
                .into_values()
                .filter(|members| !self.filter_degenerate || members.len() > 1)
                .collect();

            if surviving.is_empty() {
                debug!("Configurable {} has a single variation, keeping children simple", parent_id);
                continue;
            }

            for (position, members) in surviving.into_iter().enumerate() {
                let id = if position == 0 {
                    parent_id.clone()
                } else {
                    format!("{parent_id}-{position}")
                };

                let Some(base) = items.get(&members[0].identifier) else {
                    continue;
                };
                let parent = self.build_parent(&id, base, &members, &group.removed_attributes);
                report.grouped_children += members.len();
                children.extend(members.into_iter().map(|m| m.identifier));
                parents.push((id, parent));
            }
        }

        if !self.child_overrides.is_empty() {
            let mut seen = HashSet::new();
            for identifier in children.iter().filter(|id| seen.insert(id.as_str())) {
                if let Some(child) = items.get_mut(identifier) {
                    apply_template(child, &self.child_overrides);
                }
            }
        }

        report.created_groups = parents.len();
        for (id, parent) in parents {
            items.insert(id, parent);
        }

        counter!("feed_importer_configurables_created_total").increment(report.created_groups as u64);
        info!(
            "Configurables: {} potential, {} extra after splitting, {} created",
            report.potential_groups, report.split_groups, report.created_groups
        );
        report
    }

    fn collect(&self, items: &ItemCollection) -> (IndexMap<String, PendingGroup>, BTreeSet<String>) {
        let mut groups: IndexMap<String, PendingGroup> = IndexMap::new();
        let mut skipped_parents = BTreeSet::new();

        for (identifier, item) in items {
            let parent_ids = self.strategy.parent_ids(item);
            if parent_ids.is_empty() {
                continue;
            }
            if !item.is_online() || item.is_configurable() {
                skipped_parents.extend(parent_ids);
                continue;
            }

            for parent_id in parent_ids {
                if parent_id == *identifier {
                    warn!("Product {} names itself as configurable parent, skipping", identifier);
                    continue;
                }

                let group = groups.entry(parent_id.clone()).or_default();
                let mut line = VariationLine::new();
                let sku = item.non_empty_text(constants::SKU).unwrap_or(identifier);
                line.insert(constants::SKU.to_string(), sku.to_string());

                for attribute in self.strategy.variation_attributes(item, &parent_id) {
                    if attribute == constants::SKU {
                        continue;
                    }
                    match item.get(&attribute) {
                        Some(Value::List(_)) => {
                            warn!(
                                "Variation attribute {} of {} holds several values, leaving it out",
                                attribute, identifier
                            );
                        }
                        Some(value) => {
                            line.insert(attribute.clone(), value.to_flat_string());
                        }
                        None => {}
                    }
                    group.removed_attributes.insert(attribute);
                }

                group.members.push(Member {
                    identifier: identifier.clone(),
                    split_key: self.strategy.split_key(item).unwrap_or_default(),
                    line,
                });
            }
        }

        (groups, skipped_parents)
    }

    /// Partitions children by split key: numeric keys first in numeric order, then the rest as text.
    fn split(&self, members: Vec<Member>) -> IndexMap<String, Vec<Member>> {
        let mut partitions: IndexMap<String, Vec<Member>> = IndexMap::new();
        for member in members {
            partitions.entry(member.split_key.clone()).or_default().push(member);
        }
        partitions.sort_by(|a, _, b, _| compare_split_keys(a, b));
        partitions
    }

    fn build_parent(
        &self,
        id: &str,
        base: &Item,
        members: &[Member],
        removed_attributes: &BTreeSet<String>,
    ) -> Item {
        let mut parent = base.clone();
        parent.set(constants::SKU, id);
        parent.set(constants::PRODUCT_TYPE, constants::TYPE_CONFIGURABLE);
        apply_template(&mut parent, &self.parent_template);

        for attribute in removed_attributes {
            parent.remove(attribute);
        }

        let lines: Vec<VariationLine> = members.iter().map(|m| m.line.clone()).collect();
        parent.set(constants::CONFIGURABLE_VARIATIONS, self.codec.encode(&lines));
        parent
    }
}

fn numeric_key(key: &str) -> Option<f64> {
    key.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn compare_split_keys(a: &str, b: &str) -> Ordering {
    match (numeric_key(a), numeric_key(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}
