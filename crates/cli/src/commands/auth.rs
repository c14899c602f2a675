//! Session commands: login, register, logout, whoami.

use secrecy::SecretString;
use shopfront_client::ClientConfig;
use shopfront_client::models::{NewUser, User};
use shopfront_core::Email;
use tracing::info;

use super::{CommandError, connect, connect_authenticated};

/// Log in and persist the token.
///
/// # Errors
///
/// Returns an error if the credentials are rejected or the token cannot be
/// stored.
pub async fn login(
    config: &ClientConfig,
    username: &str,
    password: &SecretString,
) -> Result<(), CommandError> {
    let storefront = connect(config).await?;
    storefront.auth().login(username, password).await?;

    match storefront.auth().user() {
        Some(user) => print_user("Logged in as", &user),
        None => info!("Logged in, but the profile could not be loaded"),
    }
    Ok(())
}

/// Create an account and log into it.
///
/// # Errors
///
/// Returns an error if the email is malformed, the username or email is
/// taken, or the follow-up login fails.
pub async fn register(
    config: &ClientConfig,
    email: &str,
    username: &str,
    full_name: Option<String>,
    password: SecretString,
) -> Result<(), CommandError> {
    let email = Email::parse(email)?;
    let mut new_user = NewUser::new(email, username, password);
    if let Some(full_name) = full_name {
        new_user = new_user.with_full_name(full_name);
    }

    let storefront = connect(config).await?;
    let user = storefront.auth().register(&new_user).await?;
    print_user("Registered", &user);
    Ok(())
}

/// Forget the stored token.
///
/// # Errors
///
/// Returns an error if the token file cannot be written.
pub async fn logout(config: &ClientConfig) -> Result<(), CommandError> {
    let storefront = connect(config).await?;
    storefront.auth().logout()?;
    info!("Logged out");
    Ok(())
}

/// Show the logged-in user.
///
/// # Errors
///
/// Returns an error if there is no valid session.
pub async fn whoami(config: &ClientConfig) -> Result<(), CommandError> {
    let storefront = connect_authenticated(config).await?;
    let user = storefront.auth().user().ok_or(CommandError::SessionExpired)?;
    print_user("Logged in as", &user);
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_user(prefix: &str, user: &User) {
    println!("{prefix} {} <{}>", user.display_name(), user.email);
    println!("  username: {}", user.username);
    if let Some(created_at) = &user.created_at {
        println!("  member since: {created_at}");
    }
}
