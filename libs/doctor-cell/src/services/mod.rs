pub mod doctor;
pub mod availability;
pub mod directory;
pub mod seed;

pub use doctor::DoctorService;
pub use availability::{apply_template_to_dates, AvailabilityEditor, AvailabilityService};
pub use directory::{filter_doctors, unique_specialties};
pub use seed::{generate_doctors, seed_doctors};
