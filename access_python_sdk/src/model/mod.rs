pub mod deadline;
pub mod error;
pub mod invoke;
pub mod lease;
pub mod request_id;
