//! Database entities

pub mod api_key;
pub mod connection;
pub mod port_pool;

pub use api_key::Entity as ApiKey;
pub use connection::Entity as Connection;
pub use port_pool::Entity as PortPool;

pub mod prelude {
    pub use super::api_key::Entity as ApiKey;
    pub use super::connection::Entity as Connection;
    pub use super::port_pool::Entity as PortPool;
}
