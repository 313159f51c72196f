pub mod db;
pub mod diagnosis_http;
pub mod memory;

pub use db::DbAdapter;
pub use diagnosis_http::HttpDiagnosisAdapter;
pub use memory::MemoryAdapter;
