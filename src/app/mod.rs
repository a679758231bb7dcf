pub mod ports;
pub mod import_use_case;

pub use import_use_case::{ImportRun, ImportUseCase};
