//! Repository / data mapper core.
//!
//! Entities are described by JSON definitions loaded once into a
//! `DefinitionRegistry`, materialized by an `EntityBuilder`, queried through
//! deferred finders and persisted through a pluggable `DataMapper`.

pub mod builder;
pub mod db;
pub mod definition;
pub mod entity;
pub mod error;
pub mod finder;
pub mod logging;
pub mod mapper;
pub mod query;
pub mod record;
pub mod repository;
pub mod value;

pub use builder::EntityBuilder;
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use definition::{
    DefinitionError, DefinitionRegistry, EntityConfig, EntityDefinition, EntitySection,
    FieldDefinition, FieldType, Locator, LocatorStrategy, MapStrategy, RecursiveDirectoryStrategy,
    RelationDefinition, RelationKind,
};
pub use entity::{Entity, RelationHandle};
pub use error::{OrmError, OrmResult};
pub use finder::{CollectionFinder, EntityFinder, Item, Items};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use mapper::{
    DataMapper, MemoryDataMapper, MemoryStore, PendingChange, SqliteDataMapper, SqliteStore,
};
pub use query::{
    ColumnSpec, Condition, Direction, DirectionSpec, Operator, OperatorSpec, OrderBy, Query,
};
pub use record::Record;
pub use repository::Repository;
pub use value::Value;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
