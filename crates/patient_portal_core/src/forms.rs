//! crates/patient_portal_core/src/forms.rs
//!
//! Editable forms for medical-history entries and account registration.
//!
//! Forms carry what a user types: dates as `YYYY-MM-DD` and lists as a single
//! comma-separated string. Converting a form into a record validates it and
//! splits the lists; converting a record back joins them with the locale's
//! separator.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Locale;
use crate::medical_history::{
    Allergy, AllergySeverity, AllergyType, Disease, DiseaseSeverity, DiseaseStatus, MedicalRecord,
    Medication, TravelHistory, TravelPurpose,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("{0} must be a date in YYYY-MM-DD form")]
    InvalidDate(&'static str),
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Password must be at least {0} characters")]
    WeakPassword(usize),
    #[error("Invalid email address")]
    InvalidEmail,
}

/// Splits free text on `,` (or the Arabic `،`) into trimmed, non-empty items.
pub fn split_text_to_array(text: &str) -> Vec<String> {
    text.split([',', '،'])
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn join_for_display(items: &[String], locale: Locale) -> String {
    items.join(locale.list_separator())
}

fn required(value: &str, field: &'static str) -> Result<(), FormError> {
    if value.trim().is_empty() {
        return Err(FormError::MissingField(field));
    }
    Ok(())
}

fn parse_date(value: &str, field: &'static str) -> Result<DateTime<Utc>, FormError> {
    required(value, field)?;
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map(|date| Utc.from_utc_datetime(&date.and_time(NaiveTime::default())))
        .map_err(|_| FormError::InvalidDate(field))
}

fn parse_optional_date(value: &str, field: &'static str) -> Result<Option<DateTime<Utc>>, FormError> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    parse_date(value, field).map(Some)
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn optional_text(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// A form that edits one kind of medical-history entry.
pub trait RecordForm: Sized {
    type Record: MedicalRecord;

    /// Validates the form and builds the entry owned by `patient_id`.
    fn into_record(self, patient_id: &str, id: Option<String>) -> Result<Self::Record, FormError>;

    /// Prefills the form from a stored entry.
    fn from_record(record: &Self::Record, locale: Locale) -> Self;
}

//=========================================================================================
// Disease
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiseaseForm {
    pub disease_name: String,
    pub diagnosis_date: String,
    pub status: DiseaseStatus,
    pub severity: DiseaseSeverity,
    #[serde(default)]
    pub symptoms: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub treatments: String,
    #[serde(default)]
    pub doctor_name: String,
    #[serde(default)]
    pub hospital_name: String,
}

impl RecordForm for DiseaseForm {
    type Record = Disease;

    fn into_record(self, patient_id: &str, id: Option<String>) -> Result<Disease, FormError> {
        required(&self.disease_name, "diseaseName")?;
        let diagnosis_date = parse_date(&self.diagnosis_date, "diagnosisDate")?;

        Ok(Disease {
            id,
            patient_id: patient_id.to_string(),
            disease_name: self.disease_name.trim().to_string(),
            diagnosis_date,
            status: self.status,
            severity: self.severity,
            symptoms: split_text_to_array(&self.symptoms),
            notes: optional_text(self.notes),
            treatments: split_text_to_array(&self.treatments),
            doctor_name: optional_text(self.doctor_name),
            hospital_name: optional_text(self.hospital_name),
        })
    }

    fn from_record(record: &Disease, locale: Locale) -> Self {
        Self {
            disease_name: record.disease_name.clone(),
            diagnosis_date: format_date(&record.diagnosis_date),
            status: record.status,
            severity: record.severity,
            symptoms: join_for_display(&record.symptoms, locale),
            notes: record.notes.clone().unwrap_or_default(),
            treatments: join_for_display(&record.treatments, locale),
            doctor_name: record.doctor_name.clone().unwrap_or_default(),
            hospital_name: record.hospital_name.clone().unwrap_or_default(),
        }
    }
}

//=========================================================================================
// Allergy
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllergyForm {
    pub allergy_name: String,
    pub allergy_type: AllergyType,
    pub severity: AllergySeverity,
    #[serde(default)]
    pub symptoms: String,
    #[serde(default)]
    pub diagnosis_date: String,
    #[serde(default)]
    pub treatment: String,
    #[serde(default)]
    pub notes: String,
}

impl RecordForm for AllergyForm {
    type Record = Allergy;

    fn into_record(self, patient_id: &str, id: Option<String>) -> Result<Allergy, FormError> {
        required(&self.allergy_name, "allergyName")?;
        let diagnosis_date = parse_optional_date(&self.diagnosis_date, "diagnosisDate")?;

        Ok(Allergy {
            id,
            patient_id: patient_id.to_string(),
            allergy_name: self.allergy_name.trim().to_string(),
            allergy_type: self.allergy_type,
            severity: self.severity,
            symptoms: split_text_to_array(&self.symptoms),
            diagnosis_date,
            treatment: optional_text(self.treatment),
            notes: optional_text(self.notes),
        })
    }

    fn from_record(record: &Allergy, locale: Locale) -> Self {
        Self {
            allergy_name: record.allergy_name.clone(),
            allergy_type: record.allergy_type,
            severity: record.severity,
            symptoms: join_for_display(&record.symptoms, locale),
            diagnosis_date: record.diagnosis_date.as_ref().map(format_date).unwrap_or_default(),
            treatment: record.treatment.clone().unwrap_or_default(),
            notes: record.notes.clone().unwrap_or_default(),
        }
    }
}

//=========================================================================================
// Medication
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationForm {
    pub medication_name: String,
    pub dosage: String,
    pub frequency: String,
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub prescribed_by: String,
    pub reason_for_taking: String,
    #[serde(default)]
    pub side_effects: String,
    #[serde(default)]
    pub notes: String,
}

fn default_active() -> bool {
    true
}

impl RecordForm for MedicationForm {
    type Record = Medication;

    fn into_record(self, patient_id: &str, id: Option<String>) -> Result<Medication, FormError> {
        required(&self.medication_name, "medicationName")?;
        required(&self.dosage, "dosage")?;
        required(&self.frequency, "frequency")?;
        required(&self.reason_for_taking, "reasonForTaking")?;
        let start_date = parse_date(&self.start_date, "startDate")?;
        let end_date = parse_optional_date(&self.end_date, "endDate")?;

        Ok(Medication {
            id,
            patient_id: patient_id.to_string(),
            medication_name: self.medication_name.trim().to_string(),
            dosage: self.dosage.trim().to_string(),
            frequency: self.frequency.trim().to_string(),
            start_date,
            end_date,
            is_active: self.is_active,
            prescribed_by: optional_text(self.prescribed_by),
            reason_for_taking: self.reason_for_taking.trim().to_string(),
            side_effects: split_text_to_array(&self.side_effects),
            notes: optional_text(self.notes),
        })
    }

    fn from_record(record: &Medication, locale: Locale) -> Self {
        Self {
            medication_name: record.medication_name.clone(),
            dosage: record.dosage.clone(),
            frequency: record.frequency.clone(),
            start_date: format_date(&record.start_date),
            end_date: record.end_date.as_ref().map(format_date).unwrap_or_default(),
            is_active: record.is_active,
            prescribed_by: record.prescribed_by.clone().unwrap_or_default(),
            reason_for_taking: record.reason_for_taking.clone(),
            side_effects: join_for_display(&record.side_effects, locale),
            notes: record.notes.clone().unwrap_or_default(),
        }
    }
}

//=========================================================================================
// Travel
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelForm {
    pub destination: String,
    pub departure_date: String,
    pub return_date: String,
    pub purpose: TravelPurpose,
    #[serde(default)]
    pub health_issues: String,
    #[serde(default)]
    pub vaccinations: String,
    #[serde(default)]
    pub countries_visited: String,
    #[serde(default)]
    pub notes: String,
}

impl RecordForm for TravelForm {
    type Record = TravelHistory;

    fn into_record(self, patient_id: &str, id: Option<String>) -> Result<TravelHistory, FormError> {
        required(&self.destination, "destination")?;
        let departure_date = parse_date(&self.departure_date, "departureDate")?;
        let return_date = parse_date(&self.return_date, "returnDate")?;

        Ok(TravelHistory {
            id,
            patient_id: patient_id.to_string(),
            destination: self.destination.trim().to_string(),
            departure_date,
            return_date,
            purpose: self.purpose,
            health_issues_during_travel: split_text_to_array(&self.health_issues),
            vaccinations_taken: split_text_to_array(&self.vaccinations),
            countries_visited: split_text_to_array(&self.countries_visited),
            notes: optional_text(self.notes),
        })
    }

    fn from_record(record: &TravelHistory, locale: Locale) -> Self {
        Self {
            destination: record.destination.clone(),
            departure_date: format_date(&record.departure_date),
            return_date: format_date(&record.return_date),
            purpose: record.purpose,
            health_issues: join_for_display(&record.health_issues_during_travel, locale),
            vaccinations: join_for_display(&record.vaccinations_taken, locale),
            countries_visited: join_for_display(&record.countries_visited, locale),
            notes: record.notes.clone().unwrap_or_default(),
        }
    }
}

//=========================================================================================
// Registration
//=========================================================================================

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationForm {
    pub patient_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub date_of_birth: String,
    #[serde(default)]
    pub gender: String,
}

/// The form an email is stored and looked up in: trimmed and lower-cased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl RegistrationForm {
    /// Checks the form before any account is created. Returns the parsed date of birth.
    pub fn validate(&self) -> Result<NaiveDate, FormError> {
        required(&self.patient_name, "patientName")?;
        required(&self.email, "email")?;
        required(&self.password, "password")?;
        required(&self.phone_number, "phoneNumber")?;
        required(&self.date_of_birth, "dateOfBirth")?;
        required(&self.gender, "gender")?;
        if !self.email.contains('@') {
            return Err(FormError::InvalidEmail);
        }
        if self.password != self.confirm_password {
            return Err(FormError::PasswordMismatch);
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(FormError::WeakPassword(MIN_PASSWORD_LEN));
        }
        NaiveDate::parse_from_str(self.date_of_birth.trim(), DATE_FORMAT)
            .map_err(|_| FormError::InvalidDate("dateOfBirth"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn split_trims_and_drops_empty_items() {
        assert_eq!(
            split_text_to_array(" cough, ,fever ،  rash,"),
            ["cough", "fever", "rash"]
        );
        assert!(split_text_to_array("  ").is_empty());
    }

    #[test]
    fn disease_form_round_trips_through_the_record() {
        let form: DiseaseForm = serde_json::from_value(json!({
            "diseaseName": " Diabetes ",
            "diagnosisDate": "2019-07-15",
            "status": "in_treatment",
            "severity": "severe",
            "symptoms": "polyuria, excessive_hunger",
            "treatments": "insulin"
        }))
        .unwrap();

        let record = form.into_record("p1", None).unwrap();
        assert_eq!(record.disease_name, "Diabetes");
        assert_eq!(record.status, DiseaseStatus::InTreatment);
        assert_eq!(record.symptoms, ["polyuria", "excessive_hunger"]);
        assert_eq!(record.notes, None);

        let edit = DiseaseForm::from_record(&record, Locale::En);
        assert_eq!(edit.diagnosis_date, "2019-07-15");
        assert_eq!(edit.symptoms, "polyuria, excessive_hunger");

        let arabic = DiseaseForm::from_record(&record, Locale::Ar);
        assert_eq!(arabic.symptoms, "polyuria، excessive_hunger");
        assert_eq!(split_text_to_array(&arabic.symptoms), record.symptoms);
    }

    #[test]
    fn missing_required_fields_are_rejected() {
        let form = TravelForm {
            destination: "  ".to_string(),
            departure_date: "2024-01-01".to_string(),
            return_date: "2024-01-10".to_string(),
            purpose: TravelPurpose::Tourism,
            health_issues: String::new(),
            vaccinations: String::new(),
            countries_visited: String::new(),
            notes: String::new(),
        };
        assert_eq!(
            form.into_record("p1", None).unwrap_err(),
            FormError::MissingField("destination")
        );
    }

    #[test]
    fn optional_dates_may_be_blank_but_not_malformed() {
        let mut form = MedicationForm {
            medication_name: "Metformin".to_string(),
            dosage: "500mg".to_string(),
            frequency: "twice daily".to_string(),
            start_date: "2023-02-01".to_string(),
            end_date: String::new(),
            is_active: true,
            prescribed_by: String::new(),
            reason_for_taking: "diabetes".to_string(),
            side_effects: "nausea".to_string(),
            notes: String::new(),
        };
        let record = form.clone().into_record("p1", Some("m1".to_string())).unwrap();
        assert_eq!(record.end_date, None);
        assert_eq!(record.id.as_deref(), Some("m1"));

        form.end_date = "next week".to_string();
        assert_eq!(
            form.into_record("p1", None).unwrap_err(),
            FormError::InvalidDate("endDate")
        );
    }

    #[test]
    fn registration_checks_passwords() {
        let mut form = RegistrationForm {
            patient_name: "Layla".to_string(),
            email: "layla@example.com".to_string(),
            password: "secret1".to_string(),
            confirm_password: "secret2".to_string(),
            phone_number: "0500000000".to_string(),
            date_of_birth: "1990-04-03".to_string(),
            gender: "female".to_string(),
        };
        assert_eq!(form.validate(), Err(FormError::PasswordMismatch));

        form.confirm_password = "secret1".to_string();
        assert_eq!(form.validate().ok(), NaiveDate::from_ymd_opt(1990, 4, 3));

        form.password = "abc".to_string();
        form.confirm_password = "abc".to_string();
        assert_eq!(form.validate(), Err(FormError::WeakPassword(MIN_PASSWORD_LEN)));

        form.email = "layla".to_string();
        assert_eq!(form.validate(), Err(FormError::InvalidEmail));
    }

    #[test]
    fn registration_requires_contact_details() {
        let mut form = RegistrationForm {
            patient_name: "Layla".to_string(),
            email: "layla@example.com".to_string(),
            password: "secret1".to_string(),
            confirm_password: "secret1".to_string(),
            phone_number: " ".to_string(),
            date_of_birth: "1990-04-03".to_string(),
            gender: "female".to_string(),
        };
        assert_eq!(form.validate(), Err(FormError::MissingField("phoneNumber")));

        form.phone_number = "0500000000".to_string();
        form.date_of_birth = String::new();
        assert_eq!(form.validate(), Err(FormError::MissingField("dateOfBirth")));

        form.date_of_birth = "1990-04-03".to_string();
        form.gender = String::new();
        assert_eq!(form.validate(), Err(FormError::MissingField("gender")));
    }

    #[test]
    fn emails_are_trimmed_and_lower_cased() {
        assert_eq!(normalize_email("  Sara@Example.COM "), "sara@example.com");
    }
}
