pub mod db;
pub mod memory;
pub mod store;

pub use db::SqliteCardboxStore;
pub use memory::MemoryCardboxStore;
pub use store::{CardboxStore, shift_date, validate_record};
