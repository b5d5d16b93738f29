use std::cmp::Ordering;

use crate::models::{DirectoryQuery, DoctorProfile, SortBy};

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn matches_text(doctor: &DoctorProfile, needle: &str, search_clinic: bool) -> bool {
    contains_ignore_case(&doctor.name, needle)
        || contains_ignore_case(&doctor.specialty, needle)
        || (search_clinic && contains_ignore_case(&doctor.clinic.name, needle))
}

/// Every active filter must hold; inactive (`None` or blank) filters are skipped.
pub fn matches(doctor: &DoctorProfile, query: &DirectoryQuery) -> bool {
    let needle = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    if let Some(needle) = &needle {
        if !matches_text(doctor, needle, query.search_clinic) {
            return false;
        }
    }

    let specialty_ok = query
        .specialty
        .as_deref()
        .filter(|s| !s.is_empty())
        .map_or(true, |specialty| doctor.specialty == specialty);
    let city_ok = query
        .city
        .as_deref()
        .filter(|s| !s.is_empty())
        .map_or(true, |city| doctor.clinic.city == city);
    let fee_ok = query.max_fee.map_or(true, |max| doctor.consultation_fee <= max);
    let rating_ok = query.min_rating.map_or(true, |min| doctor.rating >= min);
    let experience_ok = query.min_experience.map_or(true, |min| doctor.experience >= min);

    specialty_ok && city_ok && fee_ok && rating_ok && experience_ok
}

fn compare(a: &DoctorProfile, b: &DoctorProfile, sort_by: SortBy) -> Ordering {
    match sort_by {
        SortBy::Rating => b.rating.total_cmp(&a.rating),
        SortBy::Experience => b.experience.cmp(&a.experience),
        SortBy::Fee => a.consultation_fee.cmp(&b.consultation_fee),
    }
}

/// Filter then sort by a single key. The sort is stable, so ties keep their fetched order.
pub fn filter_doctors(doctors: &[DoctorProfile], query: &DirectoryQuery) -> Vec<DoctorProfile> {
    let mut result: Vec<DoctorProfile> = doctors
        .iter()
        .filter(|doctor| matches(doctor, query))
        .cloned()
        .collect();

    result.sort_by(|a, b| compare(a, b, query.sort_by));
    result
}

/// Specialties in first-seen order, without repeats.
pub fn unique_specialties(doctors: &[DoctorProfile]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for doctor in doctors {
        if !seen.contains(&doctor.specialty) {
            seen.push(doctor.specialty.clone());
        }
    }
    seen
}
