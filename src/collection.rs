pub mod default;
pub mod interface;
#[cfg(feature = "backend-postgres")]
pub mod postgres;
pub(crate) mod scan;
pub mod sqlite;
