//! User account commands.
//!
//! # Usage
//!
//! ```bash
//! # A shopper who logs in with a password
//! rd-cli user create -e shopper@example.com -p 'a long password'
//!
//! # A merchant account without password login
//! rd-cli user create -e owner@example.com --merchant
//! ```

use raredoor_marketplace::services::{AccountError, AccountService, Registration};
use tracing::info;

/// Create a user and their profile.
///
/// # Errors
///
/// Returns an error if the email or password is invalid, the email is
/// already registered, or the database is unreachable.
pub async fn create(
    email: &str,
    password: Option<&str>,
    first_name: &str,
    last_name: &str,
    is_merchant: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (_, pool) = super::connect().await?;

    let registration = Registration {
        email,
        password,
        first_name,
        last_name,
        is_merchant,
        ..Registration::default()
    };

    let (user, profile) = match AccountService::new(&pool).register(&registration).await {
        Ok(created) => created,
        Err(AccountError::UserAlreadyExists) => {
            return Err(format!("A user already exists with email: {email}").into());
        }
        Err(e) => return Err(e.into()),
    };

    info!(
        user_id = %user.id,
        username = %user.username,
        is_merchant = profile.is_merchant,
        has_password = password.is_some(),
        "Created user"
    );
    Ok(())
}
