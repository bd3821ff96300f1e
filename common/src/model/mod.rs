pub mod account;
pub mod response;
pub mod status;
