use anyhow::{bail, Context};
use tracing::info;

use aqar_api::services::LoginRequest;

use crate::state::AppState;

pub async fn login(state: &AppState, email: String, password: String) -> anyhow::Result<()> {
    let session = state
        .auth
        .login(&LoginRequest { email, password })
        .await
        .context("Login failed")?;

    let Some(user) = session.user else {
        bail!("Logged in, but the backend sent no profile");
    };
    info!(user_id = %user.id, "Logged in");
    println!("Logged in as {} (#{})", user.name.as_deref().unwrap_or("?"), user.id);
    Ok(())
}

pub async fn logout(state: &AppState) -> anyhow::Result<()> {
    // Local state is cleared even when the server call fails.
    if let Err(e) = state.auth.logout().await {
        tracing::warn!(error = %e, "Server-side logout failed");
    }
    state.queries.clear();
    println!("Logged out");
    Ok(())
}

pub async fn whoami(state: &AppState) -> anyhow::Result<()> {
    if state.current_user()?.is_none() {
        println!("Not logged in");
        return Ok(());
    }
    let user = state.auth.profile().await.context("Could not load profile")?;
    println!("{} (#{})", user.name.as_deref().unwrap_or("?"), user.id);
    Ok(())
}
