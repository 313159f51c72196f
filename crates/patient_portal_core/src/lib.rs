pub mod diagnosis;
pub mod domain;
pub mod exams;
pub mod forms;
pub mod medical_history;
pub mod messages;
pub mod ports;
pub mod symptoms;

#[cfg(test)]
mod testing;

pub use diagnosis::{ConfidenceLevel, DiagnoseRequest, DiagnosisError, DiagnosisResult, DiagnosisSummary};
pub use domain::{AuthSession, Locale, Patient, SessionContext, User, UserCredentials};
pub use exams::{DateFallback, DecodedExam, ExamHistory, ExamRecord};
pub use medical_history::{MedicalHistory, MedicalHistoryRepository, MedicalRecord};
pub use ports::{DiagnosisService, DocumentStore, IdentityService, PortError, PortResult, StoredDocument};
pub use symptoms::SymptomSelection;
