pub mod cors;
pub mod timeout;
