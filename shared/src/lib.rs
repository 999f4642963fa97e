pub mod admin_service;
pub mod http;
pub mod metrics_defs;
pub mod party;
