pub mod http_client;
pub mod in_memory;
pub mod json_import_engine;

pub use http_client::ReqwestHttpClient;
pub use in_memory::{
    CatalogSnapshot, InMemoryLinkStore, InMemoryOptionStore, InMemoryUrlIndex, SeededCatalog,
    StaticMargins,
};
pub use json_import_engine::JsonFileImportEngine;
