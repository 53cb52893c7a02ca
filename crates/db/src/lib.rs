pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{DemoInventory, SeedResult};
pub use repositories::{
    FallbackContextStore, InMemoryContextStore, RepositoryError, SqlContextStore,
    SqlInventorySource,
};
