//! HTTP transport

pub mod client;

pub use client::{HttpTransport, HttpTransportBuilder, Transport, TransportRequest, TransportResponse};
