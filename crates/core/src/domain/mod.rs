pub mod context;
pub mod filter;
pub mod inventory;
pub mod money;
pub mod response;
