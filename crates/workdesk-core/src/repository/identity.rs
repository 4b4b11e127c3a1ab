//! Identity collaborator port.

use workdesk_types::error::RepositoryError;
use workdesk_types::identity::Caller;

/// Resolves an opaque bearer credential into a verified caller.
pub trait IdentityProvider: Send + Sync {
    /// `Ok(None)` when the credential is unknown.
    fn verify(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<Option<Caller>, RepositoryError>> + Send;
}
