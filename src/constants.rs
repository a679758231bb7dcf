/// Field names understood by the catalog import engine.
/// Stages read and write items through these names so every step agrees on the row layout.

pub const SKU: &str = "sku";
pub const PRODUCT_TYPE: &str = "product_type";
pub const PRODUCT_ONLINE: &str = "product_online";
pub const CONFIGURABLE_VARIATIONS: &str = "configurable_variations";
pub const URL_KEY: &str = "url_key";
pub const QTY: &str = "qty";

// Pricing
pub const COST: &str = "cost";
pub const PRICE: &str = "price";
pub const FEE: &str = "fee";
pub const FEE_COST: &str = "fee_cost";
pub const CATEGORIES: &str = "categories";
pub const TIER_PRICES: &str = "tier_prices";

/// Codec-encoded columns that carry their own cost fields.
pub const PRICED_OPTION_FIELDS: [&str; 3] = ["tier_prices", "options_pricing", "custom_options"];

// Product types
pub const TYPE_CONFIGURABLE: &str = "configurable";

/// Mapping literal that explicitly empties a field.
pub const FIELD_EMPTY: &str = "__EMPTY__";

// Asset fields
pub const DEFAULT_ASSET_FIELDS: [&str; 4] = ["image", "small_image", "thumbnail", "swatch_image"];
pub const DEFAULT_LIST_ASSET_FIELDS: [&str; 1] = ["additional_images"];
pub const DEFAULT_CONCURRENCY: usize = 25;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Numbered `identifier-key-N` fallbacks tried after the bare and prefixed url keys.
pub const SLUG_NUMBERED_FALLBACKS: usize = 4;

/// Below this many items the disabler refuses to run unless forced.
pub const DISABLER_MIN_ITEMS: usize = 100;
