pub mod appointments;
pub mod auth;
pub mod ledger;
pub mod notify;
pub mod segments;
