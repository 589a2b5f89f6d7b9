pub const AUTH_HEADER: &str = "Authorization";
pub const ACCEPT_HEADER: &str = "Accept";
pub const USER_AGENT_HEADER: &str = "User-Agent";
pub const USER_AGENT: &str = "rbac-reconciler";
/// Role origin the platform uses for its built-in roles
pub const DEFAULT_ORIGIN: &str = "DEFAULT";
