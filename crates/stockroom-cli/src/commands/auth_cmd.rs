use chrono::DateTime;
use stockroom_core::auth::{AuthView, SessionHandle};

use crate::auth::{clear_stored_session, load_stored_session, AuthError, AuthService};
use crate::cli::AuthCommands;
use crate::commands::common::CliContext;
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        AuthCommands::Login { profile, code } => {
            let context = CliContext::load(profile.as_deref().or(global_profile))?;
            let service = AuthService::for_config(&context.profile_name, &context.config)?;
            let Some(code) = code else {
                println!("Open this URL to sign in:");
                println!("{}", service.authorize_url(Some(&context.profile_name)));
                println!(
                    "Then run `stockroom auth login --code <CODE>` with the code from the redirect URL."
                );
                return Ok(());
            };

            let session = service.exchange_code(&code).await?;
            let email_label = session.user.email.as_deref().unwrap_or("(no email)");
            println!(
                "Signed in profile '{}' as {email_label}",
                context.profile_name
            );
            Ok(())
        }
        AuthCommands::Status { profile } => {
            let context = CliContext::load(profile.as_deref().or(global_profile))?;
            let handle = SessionHandle::new();
            let restored = match AuthService::for_config(&context.profile_name, &context.config) {
                Ok(service) => service.restore_session().await,
                Err(AuthError::NotConfigured) => load_stored_session(&context.profile_name),
                Err(error) => Err(error),
            };
            match restored {
                Ok(session) => handle.set_session(session),
                Err(error) => handle.fail(error.to_string()),
            }

            let name = &context.profile_name;
            match handle.view() {
                AuthView::Authenticated => {
                    if let Some(session) = handle.session() {
                        let email_label = session.user.email.as_deref().unwrap_or("(no email)");
                        println!(
                            "Profile '{name}' is signed in as {email_label} (expires {})",
                            format_expiry(session.expires_at)
                        );
                    }
                }
                AuthView::SignInPrompt => println!("Profile '{name}' is not signed in."),
                AuthView::Error(message) => {
                    println!("Profile '{name}' session could not be restored: {message}");
                }
                AuthView::Loading => println!("Profile '{name}' session is still loading."),
            }
            Ok(())
        }
        AuthCommands::Logout { profile } => {
            let context = CliContext::load(profile.as_deref().or(global_profile))?;
            match AuthService::for_config(&context.profile_name, &context.config) {
                Ok(service) => {
                    let logout_url = service.sign_out()?;
                    println!("Signed out profile '{}'", context.profile_name);
                    println!("To end the hosted sign-in session too, open: {logout_url}");
                }
                Err(AuthError::NotConfigured) => {
                    clear_stored_session(&context.profile_name)?;
                    println!("Signed out profile '{}'", context.profile_name);
                }
                Err(error) => return Err(error.into()),
            }
            Ok(())
        }
    }
}

pub fn format_expiry(expires_at: i64) -> String {
    DateTime::from_timestamp(expires_at, 0)
        .map_or_else(|| expires_at.to_string(), |time| time.to_rfc3339())
}
