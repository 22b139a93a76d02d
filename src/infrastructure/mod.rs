pub mod record_repository;

pub use record_repository::{format_file_size, format_file_size_precision, RecordRepository};
