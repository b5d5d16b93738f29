use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use shared_database::{Document, DocumentStore, Subscription};
use shared_models::auth::User;
use shared_utils::AppState;

use crate::models::{
    AvailabilityLedger, Clinic, DirectoryQuery, DoctorError, DoctorProfile, OnboardingRequest,
    CITIES, DEFAULT_ADDRESS, DEFAULT_RATING, DOCTORS_COLLECTION, QUALIFICATIONS,
    REQUIRED_FIELDS_MISSING, SPECIALTIES,
};
use crate::services::directory::{filter_doctors, unique_specialties};

pub fn avatar_url(user_id: &str) -> String {
    format!("https://avatar.iran.liara.run/public/boy?username={}", user_id)
}

pub fn parse_skills(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn decode_doctor(doc: &Document) -> Result<DoctorProfile, DoctorError> {
    doc.decode().map_err(|e| {
        error!("Doctor document {} is malformed: {}", doc.id, e);
        DoctorError::from(e)
    })
}

pub struct DoctorService {
    store: Arc<dyn DocumentStore>,
}

impl DoctorService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
        }
    }

    pub async fn get_doctor(&self, doctor_id: &str) -> Result<DoctorProfile, DoctorError> {
        debug!("Fetching doctor: {}", doctor_id);

        let doc = self
            .store
            .get(DOCTORS_COLLECTION, doctor_id)
            .await?
            .ok_or(DoctorError::NotFound)?;
        decode_doctor(&doc)
    }

    /// Full directory in store order. Malformed documents are skipped.
    pub async fn list_doctors(&self) -> Result<Vec<DoctorProfile>, DoctorError> {
        let docs = self.store.list(DOCTORS_COLLECTION).await?;
        let doctors: Vec<DoctorProfile> = docs
            .iter()
            .filter_map(|doc| decode_doctor(doc).ok())
            .collect();

        debug!("Loaded {} doctors", doctors.len());
        Ok(doctors)
    }

    pub async fn search(&self, query: &DirectoryQuery) -> Result<Vec<DoctorProfile>, DoctorError> {
        let doctors = self.list_doctors().await?;
        Ok(filter_doctors(&doctors, query))
    }

    pub async fn specialties(&self) -> Result<Vec<String>, DoctorError> {
        let doctors = self.list_doctors().await?;
        Ok(unique_specialties(&doctors))
    }

    /// Onboarding: build the profile from the form plus defaults and store it at `doctors/{uid}`.
    pub async fn create_profile(
        &self,
        user: &User,
        request: OnboardingRequest,
    ) -> Result<DoctorProfile, DoctorError> {
        if !user.is_doctor() {
            return Err(DoctorError::NotADoctor);
        }

        let workplace = request.workplace.trim();
        let bio = request.bio.trim();
        if workplace.is_empty() || bio.is_empty() {
            return Err(DoctorError::Validation(REQUIRED_FIELDS_MISSING.to_string()));
        }
        if !QUALIFICATIONS.contains(&request.qualification.as_str()) {
            return Err(DoctorError::Validation(format!(
                "Unknown qualification '{}'",
                request.qualification
            )));
        }
        if !SPECIALTIES.contains(&request.specialty.as_str()) {
            return Err(DoctorError::Validation(format!(
                "Unknown specialty '{}'",
                request.specialty
            )));
        }
        if !CITIES.contains(&request.city.as_str()) {
            return Err(DoctorError::Validation(format!("Unknown city '{}'", request.city)));
        }

        let profile = DoctorProfile {
            id: user.id.clone(),
            name: user
                .metadata
                .as_ref()
                .and_then(|m| m.get("full_name"))
                .and_then(|v| v.as_str())
                .unwrap_or("Unnamed Doctor")
                .to_string(),
            email: user.email.clone(),
            qualification: request.qualification,
            specialty: request.specialty,
            experience: request.experience,
            rating: DEFAULT_RATING,
            review_count: 0,
            consultation_fee: request.consultation_fee,
            profile_image: avatar_url(&user.id),
            bio: bio.to_string(),
            clinic: Clinic {
                name: workplace.to_string(),
                address: DEFAULT_ADDRESS.to_string(),
                city: request.city,
                coordinates: None,
            },
            skills: parse_skills(&request.skills),
            registration_number: None,
            professional_memberships: Vec::new(),
            availability: AvailabilityLedger::new(),
        };

        self.store
            .set(DOCTORS_COLLECTION, &profile.id, profile.to_document()?)
            .await
            .map_err(|e| {
                error!("Error creating doctor profile for {}: {}", user.id, e);
                DoctorError::ProfileWriteFailed
            })?;

        info!("Created doctor profile {}", profile.id);
        Ok(profile)
    }

    /// Live view of one profile. The first value is the current state; `None` means not found.
    pub async fn subscribe(
        &self,
        doctor_id: &str,
    ) -> Result<Subscription<Option<DoctorProfile>>, DoctorError> {
        let mut source = self.store.subscribe(DOCTORS_COLLECTION, doctor_id).await?;

        let initial = match source.next().await.flatten() {
            Some(doc) => Some(decode_doctor(&doc)?),
            None => None,
        };
        let (sender, receiver) = watch::channel(initial);

        let doctor_id = doctor_id.to_string();
        let task = tokio::spawn(async move {
            while let Some(update) = source.next().await {
                let profile = match update {
                    Some(doc) => match decode_doctor(&doc) {
                        Ok(profile) => Some(profile),
                        Err(_) => {
                            warn!("Skipping unreadable update for doctor {}", doctor_id);
                            continue;
                        }
                    },
                    None => None,
                };
                if sender.send(profile).is_err() {
                    break;
                }
            }
            debug!("Live view of doctor {} closed", doctor_id);
        });

        Ok(Subscription::with_task(receiver, task))
    }
}
