//! crates/patient_portal_core/src/messages.rs
//!
//! User-facing message catalogue in the supported locales.

use crate::domain::Locale;

pub fn no_symptoms_selected(locale: Locale) -> String {
    match locale {
        Locale::En => "Please select at least one symptom first".to_string(),
        Locale::Ar => "الرجاء اختيار الأعراض أولاً".to_string(),
    }
}

pub fn unknown_symptom(locale: Locale, tag: &str) -> String {
    match locale {
        Locale::En => format!("Unknown symptom: {tag}"),
        Locale::Ar => format!("عرض غير معروف: {tag}"),
    }
}

pub fn connection_failed(locale: Locale, host: &str) -> String {
    match locale {
        Locale::En => format!(
            "Could not connect to the diagnosis server. Make sure it is running at: {host}"
        ),
        Locale::Ar => format!("خطأ في الاتصال بالخادم. تأكد من أن الخادم يعمل على العنوان: {host}"),
    }
}

pub fn host_not_allowed(locale: Locale, host: &str) -> String {
    match locale {
        Locale::En => format!("The diagnosis server {host} is not allowed"),
        Locale::Ar => format!("خادم التشخيص {host} غير مسموح به"),
    }
}

/// Prefix applied to every error reported by the diagnosis server itself.
pub fn diagnosis_failed(locale: Locale, detail: &str) -> String {
    match locale {
        Locale::En => format!("An error occurred during diagnosis: {detail}"),
        Locale::Ar => format!("حدث خطأ أثناء التشخيص: {detail}"),
    }
}

pub fn generic_server_error(locale: Locale) -> String {
    match locale {
        Locale::En => "The diagnosis could not be completed".to_string(),
        Locale::Ar => "حدث خطأ في التشخيص".to_string(),
    }
}

pub fn status_error(locale: Locale, status: u16) -> String {
    match locale {
        Locale::En => format!("Error: {status}"),
        Locale::Ar => format!("خطأ: {status}"),
    }
}

pub fn unreadable_response(locale: Locale, raw: &str) -> String {
    match locale {
        Locale::En => format!("Failed to parse the diagnosis server response: {raw}"),
        Locale::Ar => format!("فشل في تحليل استجابة JSON: {raw}"),
    }
}

pub fn transport_failed(locale: Locale, detail: &str) -> String {
    match locale {
        Locale::En => format!("The request to the diagnosis server failed: {detail}"),
        Locale::Ar => format!("فشل الطلب إلى خادم التشخيص: {detail}"),
    }
}
