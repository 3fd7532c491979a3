//! Authority implementations.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use crate::error::{PlatformError, Result};
use crate::traits::{Actor, Authority, Permission};

type HmacSha256 = Hmac<Sha256>;

/// Everything is allowed and no tokens are issued.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unrestricted;

impl Authority for Unrestricted {
    fn authorize(&self, _actor: &Actor, _permission: &Permission) -> Result<()> {
        Ok(())
    }

    fn issue_token(&self, _subject: &str, _owner: Option<&str>) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Owner-or-admin rule with HMAC-SHA256 container tokens.
///
/// Tokens have the form `<subject>.<hex mac>` where the MAC covers subject and owner.
#[derive(Clone)]
pub struct OwnerPolicy {
    secret: Vec<u8>,
}

impl std::fmt::Debug for OwnerPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnerPolicy").finish_non_exhaustive()
    }
}

impl OwnerPolicy {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self> {
        let secret = secret.as_ref().to_vec();
        if secret.is_empty() {
            return Err(PlatformError::configuration("auth secret must not be empty"));
        }
        Ok(Self { secret })
    }

    fn mac(&self, subject: &str, owner: Option<&str>) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| PlatformError::configuration(format!("invalid auth secret: {}", e)))?;
        mac.update(subject.as_bytes());
        mac.update(b"\n");
        mac.update(owner.unwrap_or_default().as_bytes());
        Ok(mac)
    }

    /// Check a token previously issued for `subject` and `owner`
    pub fn verify_token(&self, token: &str, subject: &str, owner: Option<&str>) -> bool {
        let Some((token_subject, signature)) = token.rsplit_once('.') else {
            return false;
        };
        if token_subject != subject {
            return false;
        }
        let Ok(signature) = hex::decode(signature) else {
            return false;
        };
        match self.mac(subject, owner) {
            Ok(mac) => mac.verify_slice(&signature).is_ok(),
            Err(_) => false,
        }
    }
}

impl Authority for OwnerPolicy {
    fn authorize(&self, actor: &Actor, permission: &Permission) -> Result<()> {
        if actor.admin {
            return Ok(());
        }
        let Some(username) = actor.username.as_deref() else {
            return Err(PlatformError::unauthorized("authentication required"));
        };
        match permission {
            Permission::Deploy => Ok(()),
            Permission::ManageContainer { owner: None } => Ok(()),
            Permission::ManageContainer { owner: Some(owner) } if owner == username => Ok(()),
            Permission::ManageContainer { owner: Some(owner) } => {
                debug!("User {} denied access to container of {}", username, owner);
                Err(PlatformError::forbidden(format!(
                    "container is owned by {}",
                    owner
                )))
            }
        }
    }

    fn issue_token(&self, subject: &str, owner: Option<&str>) -> Result<Option<String>> {
        let mac = self.mac(subject, owner)?;
        let signature = hex::encode(mac.finalize().into_bytes());
        Ok(Some(format!("{}.{}", subject, signature)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrestricted_allows_everything() {
        let auth = Unrestricted;
        let perm = Permission::ManageContainer {
            owner: Some("alice".to_string()),
        };
        assert!(auth.authorize(&Actor::anonymous(), &perm).is_ok());
        assert_eq!(auth.issue_token("c1", Some("alice")).unwrap(), None);
    }

    #[test]
    fn test_owner_or_admin() {
        let auth = OwnerPolicy::new("secret").unwrap();
        let owned = Permission::ManageContainer {
            owner: Some("alice".to_string()),
        };

        assert!(auth.authorize(&Actor::user("alice"), &owned).is_ok());
        assert!(auth.authorize(&Actor::admin("root"), &owned).is_ok());
        assert!(matches!(
            auth.authorize(&Actor::user("bob"), &owned),
            Err(PlatformError::Forbidden(_))
        ));
        assert!(matches!(
            auth.authorize(&Actor::anonymous(), &owned),
            Err(PlatformError::Unauthorized(_))
        ));
        assert!(auth
            .authorize(&Actor::user("bob"), &Permission::ManageContainer { owner: None })
            .is_ok());
    }

    #[test]
    fn test_token_bound_to_subject_and_owner() {
        let auth = OwnerPolicy::new("secret").unwrap();
        let token = auth.issue_token("c1", Some("alice")).unwrap().unwrap();

        assert!(token.starts_with("c1."));
        assert!(auth.verify_token(&token, "c1", Some("alice")));
        assert!(!auth.verify_token(&token, "c1", Some("bob")));
        assert!(!auth.verify_token(&token, "c2", Some("alice")));

        let other = OwnerPolicy::new("other").unwrap();
        assert!(!other.verify_token(&token, "c1", Some("alice")));
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(OwnerPolicy::new("").is_err());
    }
}
