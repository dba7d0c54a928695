use anyhow::Result;
use async_trait::async_trait;

use crate::storage::Identity;
use crate::types::User;

/// Identity fixed at startup from configuration: a signed-in administrator or nobody.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredIdentity {
    user: Option<User>,
}

impl ConfiguredIdentity {
    pub fn new(email: Option<&str>) -> Self {
        let user = email
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(|e| User { email: e.to_string() });
        Self { user }
    }

    pub fn anonymous() -> Self { Self::default() }
}

#[async_trait]
impl Identity for ConfiguredIdentity {
    async fn current_user(&self) -> Result<Option<User>> { Ok(self.user.clone()) }
}
