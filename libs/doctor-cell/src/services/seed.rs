use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use shared_database::{DocumentStore, StoreError};

use crate::models::{
    AvailabilityLedger, Clinic, Coordinates, DoctorProfile, SlotLabel, CITIES, DOCTORS_COLLECTION,
    QUALIFICATIONS, SPECIALTIES,
};
use crate::services::doctor::avatar_url;

const FIRST_NAMES: [&str; 12] = [
    "Aarav", "Vivaan", "Aditya", "Ishaan", "Rohan", "Kabir",
    "Ananya", "Diya", "Meera", "Saanvi", "Priya", "Kavya",
];

const LAST_NAMES: [&str; 10] = [
    "Sharma", "Verma", "Iyer", "Reddy", "Nair", "Gupta", "Mehta", "Rao", "Das", "Kapoor",
];

const CLINIC_SUFFIXES: [&str; 5] = [
    "Clinic",
    "Hospital",
    "Care Centre",
    "Health",
    "Medical Centre",
];

const SKILLS: [&str; 8] = [
    "Preventive Care",
    "Chronic Disease Management",
    "Telemedicine",
    "Minor Procedures",
    "Diagnostics",
    "Patient Counselling",
    "Emergency Care",
    "Lifestyle Medicine",
];

const MEMBERSHIPS: [&str; 4] = [
    "Indian Medical Association",
    "Medical Council of India",
    "Association of Physicians of India",
    "Indian Academy of Pediatrics",
];

const AVAILABILITY_DAYS: i64 = 7;

fn pick<'a>(rng: &mut StdRng, items: &[&'a str]) -> &'a str {
    items.choose(rng).copied().unwrap_or_default()
}

/// Deterministic demo directory: the same `seed` and `today` always yield the same doctors.
pub fn generate_doctors(count: usize, seed: u64, today: NaiveDate) -> Vec<DoctorProfile> {
    let mut rng = StdRng::seed_from_u64(seed);
    let catalog = SlotLabel::catalog();

    (1..=count)
        .map(|n| {
            let id = format!("doctor-{:03}", n);
            let first = pick(&mut rng, &FIRST_NAMES);
            let last = pick(&mut rng, &LAST_NAMES);
            let specialty = pick(&mut rng, &SPECIALTIES).to_string();
            let city = pick(&mut rng, &CITIES).to_string();

            let mut availability = AvailabilityLedger::new();
            for offset in 0..AVAILABILITY_DAYS {
                let slot_count = rng.gen_range(4..=8);
                let slots: Vec<SlotLabel> = catalog
                    .choose_multiple(&mut rng, slot_count)
                    .cloned()
                    .collect();
                availability.upsert(today + Duration::days(offset), slots);
            }

            let skill_count = rng.gen_range(2..=4);
            let membership_count = rng.gen_range(0..=2);

            DoctorProfile {
                profile_image: avatar_url(&id),
                name: format!("Dr. {} {}", first, last),
                email: Some(format!("{}.{}{}@example.com", first, last, n).to_lowercase()),
                qualification: pick(&mut rng, &QUALIFICATIONS).to_string(),
                experience: rng.gen_range(1..=35),
                rating: (rng.gen_range(35..=50) as f64) / 10.0,
                review_count: rng.gen_range(0..=500),
                consultation_fee: rng.gen_range(3..=20) * 100,
                bio: format!("{} specialist practising in {}.", specialty, city),
                clinic: Clinic {
                    name: format!("{} {}", last, pick(&mut rng, &CLINIC_SUFFIXES)),
                    address: format!("{} Main Road", rng.gen_range(1..=200)),
                    coordinates: Some(Coordinates {
                        lat: rng.gen_range(8.0..32.0),
                        lng: rng.gen_range(70.0..88.0),
                    }),
                    city,
                },
                specialty,
                skills: SKILLS
                    .choose_multiple(&mut rng, skill_count)
                    .map(|s| s.to_string())
                    .collect(),
                registration_number: Some(format!("REG{:06}", rng.gen_range(0..1_000_000))),
                professional_memberships: MEMBERSHIPS
                    .choose_multiple(&mut rng, membership_count)
                    .map(|s| s.to_string())
                    .collect(),
                availability,
                id,
            }
        })
        .collect()
}

/// Write each doctor whose id is not already present. Returns how many were written.
pub async fn seed_doctors(
    store: &Arc<dyn DocumentStore>,
    doctors: &[DoctorProfile],
) -> Result<usize, StoreError> {
    let mut written = 0;
    for doctor in doctors {
        if store.get(DOCTORS_COLLECTION, &doctor.id).await?.is_some() {
            debug!("Doctor {} already present, skipping", doctor.id);
            continue;
        }

        let data = doctor
            .to_document()
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        store.set(DOCTORS_COLLECTION, &doctor.id, data).await?;
        written += 1;
    }

    info!("Seeded {} of {} demo doctors", written, doctors.len());
    Ok(written)
}
