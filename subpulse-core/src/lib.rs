pub mod cancel;
pub mod clock;
pub mod config;
pub mod error;
pub mod error_utils;
pub mod freshness;
pub mod source;
pub mod taxonomy;
pub mod types;

pub use cancel::*;
pub use clock::*;
pub use config::*;
pub use error::*;
pub use error_utils::*;
pub use freshness::*;
pub use source::*;
pub use taxonomy::*;
pub use types::*;
