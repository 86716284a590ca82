pub mod actor;
pub mod audit_log;
pub mod evaluation;
pub mod feedback;
pub mod quiz;
pub mod quiz_attempt;
pub mod status;
pub mod user;
