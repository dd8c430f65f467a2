//! Backend gateway adapters

mod http;

pub use http::{HttpBackendGateway, HttpGatewayConfig, MAX_ERROR_BODY_BYTES, ModelEndpoint};
