#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("unknown role `{0}`")]
    UnknownRole(String),
    #[error("unknown dashboard `{0}`")]
    UnknownDashboard(String),
}
