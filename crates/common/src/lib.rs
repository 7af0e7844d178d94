// folio-common: shared types and protocol definitions for the folio workspace

pub mod protocol;
pub mod types;
pub mod validation;
