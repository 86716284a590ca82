pub mod assessment_display;
pub mod assessment_service;
pub mod audit_service;
pub mod pg_store;
pub mod store;
