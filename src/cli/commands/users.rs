use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::{open_state, output_success};
use crate::cli::OutputFormat;
use crate::config::config;
use crate::services::password_reset;

#[derive(Subcommand)]
pub enum UserCommands {
    #[command(about = "Issue a password reset token for an active user")]
    ForgotPassword {
        #[arg(help = "Account email")]
        email: String,
    },

    #[command(about = "Set a new password using a reset token")]
    ResetPassword {
        #[arg(help = "Reset token")]
        token: String,
        #[arg(long, help = "New password")]
        password: String,
        #[arg(long, help = "New password again")]
        password_confirm: String,
    },
}

pub async fn handle(cmd: UserCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let state = open_state().await?;

    match cmd {
        UserCommands::ForgotPassword { email } => {
            let ttl = config().security.password_reset_ttl_minutes;
            let token = password_reset::issue_password_reset(&state.users, &email, ttl).await?;
            output_success(
                &output_format,
                &format!("Reset token for {} (valid for {} minutes): {}", email, ttl, token),
                Some(json!({ "token": token, "expiresInMinutes": ttl })),
            )
        }
        UserCommands::ResetPassword { token, password, password_confirm } => {
            let user = password_reset::reset_password(&state.users, &token, &password, &password_confirm).await?;
            output_success(&output_format, "Password updated", Some(json!({ "user": user })))
        }
    }
}
