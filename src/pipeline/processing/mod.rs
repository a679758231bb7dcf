// Pipeline processing: the item-collection algorithms behind the stages

pub mod asset_fetcher;
pub mod attribute_options;
pub mod category_margin;
pub mod slug;
pub mod variant_grouper;

pub use asset_fetcher::{AssetFetcher, FetchReport};
pub use attribute_options::AttributeOptionReconciler;
pub use category_margin::{apply_category_margin, MarginTable};
pub use slug::{normalize_slug, slug_candidates, UniqueSlugAllocator};
pub use variant_grouper::{FieldGrouping, GroupingReport, GroupingStrategy, VariantGrouper};
