use feed_importer::codec::LineCodec;
use feed_importer::constants;
use feed_importer::pipeline::processing::{FieldGrouping, GroupingStrategy, VariantGrouper};
use feed_importer::types::{Item, ItemCollection};
use std::collections::HashMap;

fn grouping(split_on: Option<&str>) -> Box<FieldGrouping> {
    Box::new(FieldGrouping {
        parent_field: "base".to_string(),
        parent_separator: None,
        variation_attributes: vec!["color".to_string(), "size".to_string()],
        split_on: split_on.map(str::to_string),
    })
}

fn item(fields: &[(&str, &str)]) -> Item {
    Item::from_pairs(fields.iter().copied())
}

/// Child identifiers per parent, decoded from `configurable_variations`.
fn parents_of(items: &ItemCollection) -> HashMap<String, Vec<String>> {
    let codec = LineCodec::new();
    items
        .iter()
        .filter(|(_, item)| item.is_configurable())
        .map(|(id, item)| {
            let lines = codec
                .decode(item.text(constants::CONFIGURABLE_VARIATIONS).unwrap_or_default())
                .unwrap();
            (id.clone(), lines.into_iter().map(|line| line["sku"].clone()).collect())
        })
        .collect()
}

#[test]
fn test_shirt_family_becomes_one_configurable() {
    let mut items = ItemCollection::new();
    items.insert("A".into(), item(&[("sku", "X-1"), ("color", "Red"), ("base", "P")]));
    items.insert("B".into(), item(&[("sku", "X-2"), ("color", "Blue"), ("base", "P")]));

    VariantGrouper::new(grouping(None)).group(&mut items);

    let parent = &items["P"];
    assert_eq!(
        parent.text(constants::CONFIGURABLE_VARIATIONS),
        Some("sku=X-1,color=Red|sku=X-2,color=Blue")
    );
    assert!(!parent.contains("color"));
    assert_eq!(items.len(), 3);
}

#[test]
fn test_lonely_child_stays_simple() {
    let mut items = ItemCollection::new();
    items.insert("A".into(), item(&[("sku", "X-1"), ("color", "Red"), ("base", "P")]));
    items.insert("C".into(), item(&[("sku", "Y-1"), ("color", "Red")]));
    let before = items.clone();

    VariantGrouper::new(grouping(None)).group(&mut items);

    assert!(!items.contains_key("P"));
    assert_eq!(items, before);
}

#[test]
fn test_split_key_separates_and_joins() {
    let mut items = ItemCollection::new();
    for (id, color, size, material) in [
        ("A", "Red", "S", "cotton"),
        ("B", "Blue", "S", "cotton"),
        ("C", "Red", "M", "wool"),
        ("D", "Blue", "M", "wool"),
        ("E", "Green", "L", "linen"),
    ] {
        items.insert(
            id.into(),
            item(&[("sku", id), ("color", color), ("size", size), ("material", material), ("base", "P")]),
        );
    }

    let report = VariantGrouper::new(grouping(Some("material"))).group(&mut items);
    let parents = parents_of(&items);

    // cotton < linen < wool; the single linen child is dropped before naming
    assert_eq!(report.created_groups, 2);
    assert_eq!(parents["P"], vec!["A", "B"]);
    assert_eq!(parents["P-1"], vec!["C", "D"]);
    assert!(!items["E"].is_configurable());
}

#[test]
fn test_every_grouped_item_lands_in_exactly_one_place() {
    let strategy = grouping(None);
    let mut items = ItemCollection::new();
    for n in 0..20 {
        let base = format!("P{}", n % 7);
        let online = if n % 5 == 0 { "0" } else { "1" };
        items.insert(
            format!("S{n}"),
            Item::from_pairs([
                ("sku", format!("S{n}")),
                ("color", format!("C{n}")),
                ("base", base),
                ("product_online", online.to_string()),
            ]),
        );
    }
    let eligible: Vec<String> = items
        .iter()
        .filter(|(_, item)| item.is_online() && !strategy.parent_ids(item).is_empty())
        .map(|(id, _)| id.clone())
        .collect();

    VariantGrouper::new(strategy).group(&mut items);
    let parents = parents_of(&items);

    for id in &eligible {
        let memberships = parents.values().filter(|children| children.contains(id)).count();
        assert!(memberships <= 1, "{id} is in {memberships} parents");
        if memberships == 0 {
            assert!(!items[id.as_str()].is_configurable());
        }
    }
    for children in parents.values() {
        assert!(children.len() > 1);
    }
}
