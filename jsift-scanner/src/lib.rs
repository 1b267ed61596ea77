pub mod error;
pub mod fetch;
pub mod scripts;

pub use error::{Result, ScanError};
pub use fetch::{ensure_scheme, Fetcher};
pub use scripts::script_links;
