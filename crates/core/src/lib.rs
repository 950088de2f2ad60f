pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod sections;
pub mod session;

pub use error::SessionError;
pub use handlers::{dispatch, ActionHandlers, Scheduler};
pub use models::*;
pub use router::{fallback_text, process_message, route_message, RouterConfig};
pub use sections::{render_section, SectionView, SuggestedAction};
pub use session::{
    dashboard_for_role, href_slug, parse_json_or, parse_session, role_title, Dashboard, Landing,
    Role, RoleContext, UserSession,
};
