use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::SessionError;

/// A login younger than this is redirected to the role's own dashboard.
pub const FRESH_LOGIN_THRESHOLD_SECONDS: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SupplyChain,
    PlantManager,
    Sales,
    Operations,
    Management,
}

impl Role {
    pub fn parse(value: &str) -> Result<Self, SessionError> {
        match value.trim().to_lowercase().as_str() {
            "supply_chain" => Ok(Self::SupplyChain),
            "plant_manager" => Ok(Self::PlantManager),
            "sales" => Ok(Self::Sales),
            "operations" => Ok(Self::Operations),
            "management" => Ok(Self::Management),
            other => Err(SessionError::UnknownRole(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleContext {
    #[default]
    Local,
    Global,
}

impl RoleContext {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "local" => Some(Self::Local),
            "global" => Some(Self::Global),
            _ => None,
        }
    }
}

pub fn role_title(role: Role, context: Option<RoleContext>) -> &'static str {
    match role {
        Role::SupplyChain => match context.unwrap_or_default() {
            RoleContext::Local => "Local Supply Chain Manager",
            RoleContext::Global => "Global Supply Chain Director",
        },
        Role::PlantManager | Role::Operations => "Production Manager",
        Role::Sales => "Regional Sales Manager",
        Role::Management => "Management",
    }
}

/// Title for a raw role string as stored in a session; unknown roles are
/// shown as a plain "User".
pub fn title_for_raw_role(role: &str, context: Option<RoleContext>) -> &'static str {
    Role::parse(role)
        .map(|role| role_title(role, context))
        .unwrap_or("User")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dashboard {
    Hub,
    GlobalSc,
    LocalSc,
    Optimizer,
    Sales,
    Production,
}

impl Dashboard {
    pub fn slug(self) -> &'static str {
        match self {
            Self::Hub => "hub",
            Self::GlobalSc => "global-sc",
            Self::LocalSc => "local-sc",
            Self::Optimizer => "optimizer",
            Self::Sales => "sales",
            Self::Production => "production",
        }
    }

    pub fn page(self) -> &'static str {
        match self {
            Self::Hub => "index-new.html",
            Self::GlobalSc => "global-supply-chain-new.html",
            Self::LocalSc => "local-supply-chain-new.html",
            Self::Optimizer => "optimizer-new.html",
            Self::Sales => "sales-new.html",
            Self::Production => "production-new.html",
        }
    }

    pub fn parse(value: &str) -> Result<Self, SessionError> {
        match value.trim().to_lowercase().replace('_', "-").as_str() {
            "hub" => Ok(Self::Hub),
            "global-sc" => Ok(Self::GlobalSc),
            "local-sc" => Ok(Self::LocalSc),
            "optimizer" => Ok(Self::Optimizer),
            "sales" => Ok(Self::Sales),
            "production" => Ok(Self::Production),
            other => Err(SessionError::UnknownDashboard(other.to_string())),
        }
    }

    /// Maps a navigation href such as `sales-new.html` to its dashboard.
    pub fn from_href(href: &str) -> Option<Self> {
        match page_name(href) {
            "global-supply-chain" | "global-sc" => Some(Self::GlobalSc),
            "local-supply-chain" | "local-sc" => Some(Self::LocalSc),
            "optimizer" => Some(Self::Optimizer),
            "sales" => Some(Self::Sales),
            "production" => Some(Self::Production),
            "index" | "index-new" | "hub" => Some(Self::Hub),
            _ => None,
        }
    }
}

/// Page name of an href with the `-new.html` or `.html` suffix removed.
fn page_name(href: &str) -> &str {
    let page = href.rsplit('/').next().unwrap_or(href);
    page
        .strip_suffix("-new.html")
        .or_else(|| page.strip_suffix(".html"))
        .unwrap_or(page)
}

/// Permission slug for a navigation href. Hrefs outside the known dashboards
/// use their bare page name.
pub fn href_slug(href: &str) -> &str {
    match Dashboard::from_href(href) {
        Some(dashboard) => dashboard.slug(),
        None => page_name(href),
    }
}

pub fn dashboard_for_role(role: Role) -> Dashboard {
    match role {
        Role::SupplyChain => Dashboard::LocalSc,
        Role::PlantManager | Role::Operations => Dashboard::Production,
        Role::Sales => Dashboard::Sales,
        Role::Management => Dashboard::Hub,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default)]
    pub dashboards: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSession {
    pub name: String,
    pub role: String,
    pub login_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub permissions: Option<Permissions>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "dashboard", rename_all = "snake_case")]
pub enum Landing {
    Stay,
    Redirect(Dashboard),
}

impl UserSession {
    pub fn role(&self) -> Result<Role, SessionError> {
        Role::parse(&self.role)
    }

    pub fn title(&self, context: Option<RoleContext>) -> &'static str {
        title_for_raw_role(&self.role, context)
    }

    pub fn is_fresh_login(&self, now: DateTime<Utc>) -> bool {
        self.login_time
            .map(|at| now - at < Duration::seconds(FRESH_LOGIN_THRESHOLD_SECONDS))
            .unwrap_or(false)
    }

    /// Where a page load should end up: freshly logged-in users other than
    /// management are sent to their role dashboard, except when that is the
    /// hub itself.
    pub fn resolve_landing(&self, now: DateTime<Utc>, allow_redirect: bool) -> Landing {
        let Ok(role) = self.role() else {
            return Landing::Stay;
        };
        if !allow_redirect || role == Role::Management || !self.is_fresh_login(now) {
            return Landing::Stay;
        }

        match dashboard_for_role(role) {
            Dashboard::Hub => Landing::Stay,
            dashboard => Landing::Redirect(dashboard),
        }
    }

    /// Sessions without a permission block see everything.
    pub fn can_access(&self, dashboard: Dashboard) -> bool {
        match &self.permissions {
            None => true,
            Some(permissions) => permissions
                .dashboards
                .iter()
                .any(|slug| slug == dashboard.slug()),
        }
    }

    /// Filters navigation hrefs down to the ones this session may open.
    /// With a permission block every href, known dashboard or not, needs its
    /// slug listed.
    pub fn visible_hrefs<'a>(&self, hrefs: &[&'a str]) -> Vec<&'a str> {
        let Some(permissions) = &self.permissions else {
            return hrefs.to_vec();
        };
        hrefs
            .iter()
            .copied()
            .filter(|href| {
                let slug = href_slug(href);
                permissions.dashboards.iter().any(|listed| listed == slug)
            })
            .collect()
    }
}

/// Parses a stored session, returning `None` for empty or corrupt input.
pub fn parse_session(raw: Option<&str>) -> Option<UserSession> {
    let raw = raw.map(str::trim).filter(|value| !value.is_empty())?;
    match serde_json::from_str::<UserSession>(raw) {
        Ok(session) => Some(session),
        Err(error) => {
            warn!(error = %error, "discarding unparsable user session");
            None
        }
    }
}

pub fn parse_json_or<T: DeserializeOwned>(raw: Option<&str>, default: T) -> T {
    let Some(raw) = raw.filter(|value| !value.trim().is_empty()) else {
        return default;
    };
    serde_json::from_str(raw).unwrap_or_else(|error| {
        warn!(error = %error, "falling back to default after JSON parse failure");
        default
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(role: &str, login_age_secs: i64, now: DateTime<Utc>) -> UserSession {
        UserSession {
            name: "Dana".to_string(),
            role: role.to_string(),
            login_time: Some(now - Duration::seconds(login_age_secs)),
            permissions: None,
        }
    }

    #[test]
    fn supply_chain_title_depends_on_context() {
        assert_eq!(
            role_title(Role::SupplyChain, None),
            "Local Supply Chain Manager"
        );
        assert_eq!(
            role_title(Role::SupplyChain, Some(RoleContext::Global)),
            "Global Supply Chain Director"
        );
        assert_eq!(title_for_raw_role("operations", None), "Production Manager");
        assert_eq!(title_for_raw_role("intern", None), "User");
    }

    #[test]
    fn fresh_login_redirects_to_role_dashboard() {
        let now = Utc::now();
        assert_eq!(
            session("sales", 1, now).resolve_landing(now, true),
            Landing::Redirect(Dashboard::Sales)
        );
        assert_eq!(
            session("sales", 1, now).resolve_landing(now, false),
            Landing::Stay
        );
        assert_eq!(
            session("sales", 30, now).resolve_landing(now, true),
            Landing::Stay
        );
        assert_eq!(
            session("management", 1, now).resolve_landing(now, true),
            Landing::Stay
        );
    }

    #[test]
    fn permissions_filter_navigation() {
        let now = Utc::now();
        let mut user = session("sales", 60, now);
        user.permissions = Some(Permissions {
            dashboards: vec!["sales".to_string(), "hub".to_string()],
        });

        let visible = user.visible_hrefs(&[
            "index-new.html",
            "sales-new.html",
            "optimizer-new.html",
            "global-supply-chain-new.html",
            "help.html",
        ]);
        assert_eq!(visible, vec!["index-new.html", "sales-new.html"]);
    }

    #[test]
    fn unmapped_pages_need_their_own_permission() {
        let now = Utc::now();
        let mut user = session("sales", 60, now);
        user.permissions = Some(Permissions {
            dashboards: vec!["sales".to_string()],
        });
        assert_eq!(
            user.visible_hrefs(&["sales-new.html", "reports-new.html"]),
            vec!["sales-new.html"]
        );

        user.permissions = Some(Permissions {
            dashboards: vec!["sales".to_string(), "reports".to_string()],
        });
        assert_eq!(
            user.visible_hrefs(&["sales-new.html", "reports-new.html", "help.html"]),
            vec!["sales-new.html", "reports-new.html"]
        );
        assert_eq!(href_slug("help.html"), "help");

        user.permissions = None;
        assert_eq!(
            user.visible_hrefs(&["help.html", "optimizer-new.html"]),
            vec!["help.html", "optimizer-new.html"]
        );
    }

    #[test]
    fn corrupt_session_is_discarded() {
        assert!(parse_session(Some("{not json")).is_none());
        assert!(parse_session(None).is_none());

        let parsed = parse_session(Some(
            r#"{"name":"Lee","role":"plant_manager","loginTime":"2026-01-05T10:00:00Z"}"#,
        ))
        .expect("valid session");
        assert_eq!(parsed.role(), Ok(Role::PlantManager));
        assert!(parsed.permissions.is_none());
    }

    #[test]
    fn parse_json_or_defaults() {
        assert_eq!(parse_json_or::<Vec<u8>>(Some("[1,2]"), Vec::new()), vec![1, 2]);
        assert_eq!(parse_json_or::<Vec<u8>>(Some("oops"), vec![9]), vec![9]);
        assert_eq!(parse_json_or::<Vec<u8>>(None, vec![7]), vec![7]);
    }
}
