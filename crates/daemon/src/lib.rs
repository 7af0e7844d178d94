// folio-daemon library: chapter store, paragraph versioning, export and git sync.

pub mod config;
pub mod export;
pub mod git;
pub mod rpc;
pub mod runtime;
pub mod security;
pub mod startup;
pub mod store;
pub mod sync;
pub mod versioning;

#[cfg(test)]
pub(crate) mod test_support;
