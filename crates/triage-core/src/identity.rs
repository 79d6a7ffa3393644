//! Identity collaborator
//!
//! The core never owns authentication; it asks a provider for the
//! signed-in principal and fails with `Unauthenticated` when there is
//! no session.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::{Error, Result};

/// The authenticated identity making a request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl Principal {
    /// Display name with the email as fallback
    pub fn name_or_email(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.email)
    }
}

/// Source of the current principal
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The signed-in principal, or `Unauthenticated`
    async fn current(&self) -> Result<Principal>;
}

/// Local session holding at most one principal
///
/// Backed by a watch channel so interested parties can observe
/// login/logout transitions.
#[derive(Clone)]
pub struct Session {
    state: watch::Sender<Option<Principal>>,
}

impl Session {
    /// A signed-out session
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self { state }
    }

    /// A session already signed in as the given principal
    pub fn signed_in(principal: Principal) -> Self {
        let (state, _) = watch::channel(Some(principal));
        Self { state }
    }

    pub fn sign_in(&self, principal: Principal) {
        self.state.send_replace(Some(principal));
    }

    pub fn sign_out(&self) {
        self.state.send_replace(None);
    }

    /// Observe login/logout transitions
    pub fn subscribe(&self) -> watch::Receiver<Option<Principal>> {
        self.state.subscribe()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for Session {
    async fn current(&self) -> Result<Principal> {
        self.state.borrow().clone().ok_or(Error::Unauthenticated)
    }
}
