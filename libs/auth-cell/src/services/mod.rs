pub mod auth;
pub mod identity;
pub mod local;
pub mod session;
pub mod supabase;

pub use auth::AuthService;
pub use identity::IdentityProvider;
pub use local::LocalIdentityProvider;
pub use session::{SessionEvent, SessionObserver};
pub use supabase::SupabaseIdentityProvider;
