use crate::codec::{LineCodec, VariationLine};
use crate::constants;
use crate::error::{ImportError, Result};
use crate::types::Item;
use tracing::{info, warn};

/// Category path prefixes and their margin percentages, least specific first
#[derive(Debug, Clone, Default)]
pub struct MarginTable {
    entries: Vec<(String, f64)>,
}

impl MarginTable {
    pub fn new(entries: Vec<(String, f64)>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Margin percentage for a comma-separated category list.
    ///
    /// For every category the last matching prefix counts; the last category with a match wins.
    pub fn margin_for(&self, categories: &str) -> Option<f64> {
        categories
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .filter_map(|category| {
                self.entries
                    .iter()
                    .rev()
                    .find(|(prefix, _)| category.starts_with(prefix.as_str()))
                    .map(|(_, margin)| *margin)
            })
            .last()
    }
}

/// Rounds to cents, or to three decimals below 0.10.
pub fn round_price(price: f64) -> f64 {
    let factor = if price < 0.10 { 1000.0 } else { 100.0 };
    (price * factor).round() / factor
}

fn parse_amount(identifier: &str, field: &str, raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| ImportError::invalid_item(identifier, format!("{field} '{raw}' is not a number")))
}

/// Turns `cost` into `price` on the item and inside its priced option columns.
pub fn apply_category_margin(
    identifier: &str,
    item: &mut Item,
    table: &MarginTable,
    codec: &LineCodec,
) -> Result<()> {
    item.set(constants::PRICE, "0");

    let Some(cost_raw) = item.text(constants::COST).map(str::to_string) else {
        if item.is_online() {
            info!("No cost field found for product {}, disabling product", identifier);
            item.set(constants::PRODUCT_ONLINE, "0");
        }
        return Ok(());
    };

    let Some(categories) = item.non_empty_text(constants::CATEGORIES).map(str::to_string) else {
        info!("No category found for product {}, disabling product", identifier);
        item.remove(constants::TIER_PRICES);
        item.set(constants::PRODUCT_ONLINE, "0");
        item.set(constants::PRICE, cost_raw);
        return Ok(());
    };

    let cost = parse_amount(identifier, constants::COST, &cost_raw)?;
    if cost == 0.0 {
        warn!("Cost field set to 0 for product {}, wrong prices may be imported", identifier);
    }

    let margin = match table.margin_for(&categories) {
        Some(percentage) => percentage / 100.0 + 1.0,
        None => {
            info!(
                "No margin category found for product {}, setting cost as price (categories: {})",
                identifier, categories
            );
            1.0
        }
    };

    item.set(constants::PRICE, round_price(cost * margin).to_string());

    for field in constants::PRICED_OPTION_FIELDS {
        let Some(encoded) = item.non_empty_text(field).map(str::to_string) else {
            continue;
        };
        let mut lines = codec.decode(&encoded)?;
        for line in lines.iter_mut() {
            price_line(identifier, line, margin)?;
        }
        item.set(field, codec.encode(&lines));
    }

    Ok(())
}

fn price_line(identifier: &str, line: &mut VariationLine, margin: f64) -> Result<()> {
    if let Some(fee_cost) = line.shift_remove(constants::FEE_COST) {
        let fee = parse_amount(identifier, constants::FEE_COST, &fee_cost)?;
        line.insert(constants::FEE.to_string(), round_price(fee * margin).to_string());
    }
    if let Some(cost) = line.shift_remove(constants::COST) {
        let cost = parse_amount(identifier, constants::COST, &cost)?;
        line.insert(constants::PRICE.to_string(), round_price(cost * margin).to_string());
    }
    Ok(())
}
