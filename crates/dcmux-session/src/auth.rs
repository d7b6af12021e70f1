//! Authorization-context seam — per-datacenter token negotiation.

/// Cross-datacenter authorization token.
pub type AuthToken = i64;

/// The authorization context owns token negotiation; a session only requests
/// and invalidates. A freshly negotiated token comes back to the session via
/// [`Session::supply_auth_token`](crate::Session::supply_auth_token).
pub trait AuthContext: Send + Sync {
    /// Drop any cached token for the datacenter.
    fn invalidate_token(&self, datacenter_id: i32);

    /// Ask for a fresh token for `datacenter_id`, negotiated through the
    /// master datacenter. `required` echoes the token requirement the
    /// session's transport was configured with.
    fn request_token(
        &self,
        datacenter_id: i32,
        required: Option<AuthToken>,
        master_datacenter_id: i32,
    );
}
