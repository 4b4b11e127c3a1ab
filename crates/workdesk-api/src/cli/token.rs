//! Token management CLI commands: issue, revoke.

use anyhow::{Result, bail};
use console::style;

use workdesk_types::identity::Role;

use crate::state::AppState;

/// Issue a bearer token and print it once.
pub async fn issue_token(
    state: &AppState,
    user_id: i64,
    role: Role,
    label: Option<&str>,
    json: bool,
) -> Result<()> {
    let issued = state.identity.issue(user_id, role, label).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "id": issued.id,
                "token": issued.token,
                "user_id": issued.caller.user_id,
                "role": issued.caller.role,
            })
        );
    } else {
        println!();
        println!(
            "  {} Token {} issued for user {} ({})",
            style("✓").green().bold(),
            style(issued.id).bold(),
            style(issued.caller.user_id).cyan(),
            issued.caller.role
        );
        println!("  Save it now, it won't be shown again:");
        println!();
        println!("  {}", style(&issued.token).yellow().bold());
        println!();
    }

    Ok(())
}

/// Revoke a token by id.
pub async fn revoke_token(state: &AppState, id: i64, json: bool) -> Result<()> {
    if !state.identity.revoke(id).await? {
        bail!("token {id} not found");
    }

    if json {
        println!("{}", serde_json::json!({"revoked": true, "id": id}));
    } else {
        println!("  {} Token {} revoked", style("✓").green().bold(), style(id).bold());
    }

    Ok(())
}
