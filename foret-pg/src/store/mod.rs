//! Adaptateurs de stockage : PostGIS et mémoire

pub mod memory;
pub mod pool;
pub mod postgres;

pub use memory::{MemoryCatalogue, MemoryPolygonStore};
pub use pool::{check_connection, create_pool, DatabaseConfig, DatabaseOverrides, SslMode};
pub use postgres::{create_schema, PgCatalogue, PgPolygonStore};
