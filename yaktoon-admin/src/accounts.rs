//! Staff account creation
//!
//! Admin and influencer accounts log in by their login id (`user:userId:{login}`),
//! not by email.

use anyhow::{bail, Result};
use tracing::info;
use yaktoon_api::auth::hash_password;
use yaktoon_common::models::{HashRecord, User, UserType};
use yaktoon_common::{keys, time, Store};

/// Outcome of an idempotent account creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountOutcome {
    Created { id: String },
    AlreadyExists { id: String },
}

async fn existing_login(store: &dyn Store, login: &str) -> Result<Option<String>> {
    Ok(store.get(&keys::user_by_login(login)).await?)
}

async fn save_account(store: &dyn Store, user: &User) -> Result<()> {
    store.hset(&keys::user(&user.id), &user.to_fields()).await?;
    store.set(&keys::user_by_login(&user.user_id), &user.id).await?;
    if !user.email.is_empty() {
        store.set(&keys::user_by_email(&user.email), &user.id).await?;
    }
    Ok(())
}

/// Create an admin login unless one with the same login id exists
pub async fn create_admin(
    store: &dyn Store,
    login: &str,
    password: &str,
    name: &str,
) -> Result<AccountOutcome> {
    if login.trim().is_empty() || password.is_empty() {
        bail!("Login id and password are required");
    }
    if let Some(id) = existing_login(store, login).await? {
        return Ok(AccountOutcome::AlreadyExists { id });
    }

    let now = time::now_millis();
    let user = User {
        id: format!("admin-{}", now),
        name: name.to_string(),
        user_id: login.to_string(),
        user_type: Some(UserType::Parent),
        password_hash: hash_password(password)?,
        created_at: now,
        role: Some("admin".to_string()),
        ..Default::default()
    };
    save_account(store, &user).await?;

    info!(user_id = %user.id, login, "Created admin account");
    Ok(AccountOutcome::Created { id: user.id })
}

/// Create the login an influencer uses for their dashboard
///
/// The user id equals the slug, which is what dashboard access checks match on.
pub async fn create_influencer(
    store: &dyn Store,
    slug: &str,
    password: &str,
    name: &str,
    email: Option<&str>,
) -> Result<AccountOutcome> {
    if slug.trim().is_empty() || password.is_empty() {
        bail!("Slug and password are required");
    }
    if let Some(id) = existing_login(store, slug).await? {
        return Ok(AccountOutcome::AlreadyExists { id });
    }

    let user = User {
        id: slug.to_string(),
        name: name.to_string(),
        email: email.unwrap_or_default().to_string(),
        user_id: slug.to_string(),
        user_type: Some(UserType::Influencer),
        password_hash: hash_password(password)?,
        created_at: time::now_millis(),
        influencer_slug: Some(slug.to_string()),
        ..Default::default()
    };
    save_account(store, &user).await?;

    info!(slug, "Created influencer account");
    Ok(AccountOutcome::Created { id: user.id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use yaktoon_api::auth::{load_user, verify_password};
    use yaktoon_common::MemoryStore;

    #[tokio::test]
    async fn test_create_admin_is_idempotent() {
        let store = MemoryStore::new();

        let first = create_admin(&store, "admin", "passwordadmin", "Administrator")
            .await
            .unwrap();
        let AccountOutcome::Created { id } = first else {
            panic!("expected a new account");
        };

        let user = load_user(&store, &id).await.unwrap().unwrap();
        assert!(user.is_admin());
        assert_eq!(user.user_id, "admin");
        assert!(verify_password("passwordadmin", &user.password_hash));

        let second = create_admin(&store, "admin", "other", "Someone").await.unwrap();
        assert_eq!(second, AccountOutcome::AlreadyExists { id });
    }

    #[tokio::test]
    async fn test_create_influencer_links_slug() {
        let store = MemoryStore::new();
        create_influencer(&store, "yaktoon", "yaktoon2025!", "알약툰", Some("yaktoon@rootedu.com"))
            .await
            .unwrap();

        let user = load_user(&store, "yaktoon").await.unwrap().unwrap();
        assert!(user.is_influencer());
        assert_eq!(user.influencer_slug.as_deref(), Some("yaktoon"));
        assert_eq!(
            store.get("user:email:yaktoon@rootedu.com").await.unwrap().as_deref(),
            Some("yaktoon")
        );
    }

    #[tokio::test]
    async fn test_create_admin_requires_password() {
        let store = MemoryStore::new();
        assert!(create_admin(&store, "admin", "", "A").await.is_err());
    }
}
