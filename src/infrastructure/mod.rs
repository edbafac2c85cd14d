pub mod catalog_client;
pub mod memory;
pub mod models;
pub mod order_repo;
pub mod remote;
pub mod user_client;

pub use catalog_client::HttpCatalog;
pub use memory::{InMemoryCatalog, InMemoryOrderStore, InMemoryUserDirectory};
pub use order_repo::DieselOrderStore;
pub use remote::build_client;
pub use user_client::HttpUserValidator;
