//! Quote ("devis") builder: document model, VAT totals and paginated PDF export.

pub mod calc;
pub mod config;
pub mod editor;
pub mod error;
pub mod export;
pub mod format;
pub mod layout;
pub mod lenient;
pub mod logo;
pub mod model;
pub mod profiles;
pub mod render;
pub mod store;
pub mod validate;

pub use error::{DocumentError, ExportError};
pub use export::{ExportOptions, ExportedQuote, Exporter};
pub use model::QuoteDocument;
