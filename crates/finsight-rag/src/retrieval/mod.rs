//! Scope validation and filing metadata

pub mod catalog;
pub mod scope;

pub use catalog::{company_name, FilingDetails, FilingInfo, FILING_SECTIONS};
pub use scope::AllowList;
