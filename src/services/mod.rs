pub mod account;
pub mod ingest;
pub mod share;
pub mod trash;
pub mod vault;
