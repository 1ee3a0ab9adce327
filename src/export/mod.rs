pub mod json;

pub use json::{CardboxSnapshot, export_json_to_path, import_json, import_snapshot, read_snapshot};
