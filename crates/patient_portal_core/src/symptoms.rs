//! crates/patient_portal_core/src/symptoms.rs
//!
//! The controlled symptom vocabulary understood by the inference server and
//! the user's selection drawn from it.

use std::sync::OnceLock;

/// Symptom identifiers exactly as the inference server knows them, including
/// its irregular spellings. May contain duplicates; use [`known_symptoms`].
const SYMPTOM_VOCABULARY: &[&str] = &[
    "itching", "skin_rash", "nodal_skin_eruptions", "dischromic _patches",
    "continuous_sneezing", "shivering", "chills", "watering_from_eyes",
    "stomach_pain", "acidity", "ulcers_on_tongue", "vomiting", "cough",
    "chest_pain", "yellowish_skin", "nausea", "loss_of_appetite",
    "abdominal_pain", "yellowing_of_eyes", "burning_micturition",
    "spotting_ urination", "fatigue", "weight_loss", "restlessness",
    "lethargy", "irregular_sugar_level", "blurred_and_distorted_vision",
    "obesity", "excessive_hunger", "increased_appetite", "polyuria",
    "muscle_wasting", "patches_in_throat", "high_fever", "extra_marital_contacts",
    "joint_pain", "back_pain", "constipation", "pain_during_bowel_movements",
    "pain_in_anal_region", "bloody_stool", "irritation_in_anus", "neck_pain",
    "dizziness", "cramps", "bruising", "obesity", "swollen_legs",
    "swollen_blood_vessels", "puffy_face_and_eyes", "enlarged_thyroid",
    "brittle_nails", "swollen_extremeties", "excessive_hunger",
    "drying_and_tingling_lips", "slurred_speech", "knee_pain", "hip_joint_pain",
    "muscle_weakness", "stiff_neck", "swelling_joints", "movement_stiffness",
    "spinning_movements", "loss_of_balance", "unsteadiness", "weakness_of_one_body_side",
    "loss_of_smell", "bladder_discomfort", "foul_smell_of urine",
    "continuous_feel_of_urine", "passage_of_gases", "internal_itching",
    "toxic_look_(typhos)", "depression", "irritability", "muscle_pain",
    "altered_sensorium", "red_spots_over_body", "belly_pain", "abnormal_menstruation",
    "dischromic _patches", "watering_from_eyes", "increased_appetite", "polyuria",
    "family_history", "mucoid_sputum", "rusty_sputum", "lack_of_concentration",
    "visual_disturbances", "receiving_blood_transfusion", "receiving_unsterile_injections",
    "coma", "stomach_bleeding", "distention_of_abdomen", "history_of_alcohol_consumption",
    "fluid_overload", "blood_in_sputum", "prominent_veins_on_calf", "palpitations",
    "painful_walking", "pus_filled_pimples", "blackheads", "scurring", "skin_peeling",
    "silver_like_dusting", "small_dents_in_nails", "inflammatory_nails", "blister",
    "red_sore_around_nose", "yellow_crust_ooze", "breathlessness", "sweating",
    "dehydration", "mild_fever", "sunken_eyes", "headache", "dark_urine",
    "yellow_urine", "cold_hands_and_feets", "mood_swings", "weight_gain", "anxiety",
    "indigestion", "malaise", "phlegm", "throat_irritation", "redness_of_eyes",
    "sinus_pressure", "runny_nose", "congestion", "stiff_neck", "fast_heart_rate",
    "pain_behind_the_eyes", "diarrhoea", "acute_liver_failure", "swelling_of_stomach",
];

/// The vocabulary, deduplicated and sorted ascending.
pub fn known_symptoms() -> &'static [&'static str] {
    static SORTED: OnceLock<Vec<&'static str>> = OnceLock::new();
    SORTED.get_or_init(|| {
        let mut tags = SYMPTOM_VOCABULARY.to_vec();
        tags.sort_unstable();
        tags.dedup();
        tags
    })
}

pub fn is_known(tag: &str) -> bool {
    known_symptoms().binary_search(&tag).is_ok()
}

/// Known symptoms whose human-readable form (underscores as spaces) contains `term`.
pub fn search(term: &str) -> Vec<&'static str> {
    let needle = term.to_lowercase();
    known_symptoms()
        .iter()
        .copied()
        .filter(|tag| tag.replace('_', " ").contains(&needle))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SymptomError {
    #[error("Unknown symptom: {0}")]
    Unknown(String),
}

/// A deduplicated set of known symptom tags.
///
/// Insertion order is kept so that the request sent to the inference server
/// lists symptoms the way the user picked them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymptomSelection {
    tags: Vec<String>,
}

impl SymptomSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a selection from raw tags, dropping duplicates.
    pub fn from_tags<I, S>(tags: I) -> Result<Self, SymptomError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut selection = Self::new();
        for tag in tags {
            selection.insert(tag.as_ref())?;
        }
        Ok(selection)
    }

    /// Adds `tag`. Returns `false` when it was already selected.
    pub fn insert(&mut self, tag: &str) -> Result<bool, SymptomError> {
        if !is_known(tag) {
            return Err(SymptomError::Unknown(tag.to_string()));
        }
        if self.contains(tag) {
            return Ok(false);
        }
        self.tags.push(tag.to_string());
        Ok(true)
    }

    pub fn remove(&mut self, tag: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t != tag);
        self.tags.len() != before
    }

    /// Selects `tag` if absent, deselects it otherwise. Returns whether it is now selected.
    pub fn toggle(&mut self, tag: &str) -> Result<bool, SymptomError> {
        if self.remove(tag) {
            return Ok(false);
        }
        self.insert(tag)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.tags
    }

    /// The wire form expected by the inference server.
    pub fn joined(&self) -> String {
        self.tags.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocabulary_is_sorted_and_unique() {
        let tags = known_symptoms();
        assert!(tags.windows(2).all(|w| w[0] < w[1]));
        assert!(tags.contains(&"toxic_look_(typhos)"));
        assert_eq!(tags.iter().filter(|t| **t == "obesity").count(), 1);
    }

    #[test]
    fn search_matches_on_spaced_form() {
        let hits = search("Joint Pain");
        assert!(hits.contains(&"joint_pain"));
        assert!(hits.contains(&"hip_joint_pain"));
        assert!(!hits.contains(&"knee_pain"));
        assert_eq!(search("").len(), known_symptoms().len());
    }

    #[test]
    fn selection_dedups_and_keeps_order() {
        let selection =
            SymptomSelection::from_tags(["headache", "fatigue", "headache"]).unwrap();
        assert_eq!(selection.as_slice(), ["headache", "fatigue"]);
        assert_eq!(selection.joined(), "headache, fatigue");
    }

    #[test]
    fn selection_rejects_unknown_tags() {
        let err = SymptomSelection::from_tags(["headache", "telepathy"]).unwrap_err();
        assert_eq!(err, SymptomError::Unknown("telepathy".to_string()));
    }

    #[test]
    fn toggle_flips_membership() {
        let mut selection = SymptomSelection::new();
        assert!(selection.toggle("cough").unwrap());
        assert!(selection.contains("cough"));
        assert!(!selection.toggle("cough").unwrap());
        assert!(selection.is_empty());
    }
}
