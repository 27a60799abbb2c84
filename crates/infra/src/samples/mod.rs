//! Generated sample clients built on the execution core

pub mod petstore;

pub use petstore::PetstoreClient;
