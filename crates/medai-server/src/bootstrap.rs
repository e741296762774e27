//! Seeds the configured administrator account on startup.
//!
//! Admins cannot register through the API, so a fresh database needs one
//! account to approve everyone else. An existing account with the same
//! username is left untouched.

use anyhow::Context;
use medai_storage::{DynStorage, NewAdmin};
use tracing::info;

use crate::config::BootstrapAdmin;

/// Creates the admin unless one with that username already exists.
///
/// Returns `true` when a new account was created.
pub async fn ensure_admin(storage: &DynStorage, admin: &BootstrapAdmin) -> anyhow::Result<bool> {
    if storage.find_admin(&admin.username).await?.is_some() {
        info!(username = %admin.username, "Bootstrap admin already present, skipping");
        return Ok(false);
    }

    let password_hash = medai_auth::hash_password(&admin.password)
        .context("failed to hash bootstrap admin password")?;
    let created = storage
        .create_admin(NewAdmin {
            username: admin.username.clone(),
            email: admin.email.clone(),
            password_hash,
        })
        .await?;
    info!(id = created.id, username = %created.username, "Bootstrap admin created");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> BootstrapAdmin {
        BootstrapAdmin {
            username: "root".into(),
            email: Some("root@medai.local".into()),
            password: "s3cret!".into(),
        }
    }

    #[tokio::test]
    async fn creates_admin_once() {
        let storage = medai_db_memory::create_storage();

        assert!(ensure_admin(&storage, &admin()).await.unwrap());
        assert!(!ensure_admin(&storage, &admin()).await.unwrap());

        let stored = storage.find_admin("root").await.unwrap().unwrap();
        assert!(medai_auth::verify_password("s3cret!", &stored.password_hash));
        assert!(storage.find_admin("root@medai.local").await.unwrap().is_some());
    }
}
