pub mod control;
pub mod drift;
pub mod registry;
pub mod session;

pub use control::{build_system_prompt, merge, resolve};
pub use drift::DriftTracker;
pub use registry::SessionRegistry;
pub use session::{Role, Session, SessionState};
