use clap::Subcommand;
use purrfocus_core::routes::post_login_target;
use purrfocus_core::CoreError;
use serde_json::json;

use super::{print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Create an account and sign in
    SignUp {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign in with email and password
    SignIn {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign out
    SignOut,
    /// Show the signed-in user
    Status,
}

pub async fn run(action: AuthAction) -> CliResult {
    let mut ctx = Context::open().await?;

    let result = match action {
        AuthAction::SignUp { email, password } => {
            let outcome = ctx.app.sign_up(&email, &password).await;
            signed_in(&ctx, outcome)
        }
        AuthAction::SignIn { email, password } => {
            let outcome = ctx.app.sign_in(&email, &password).await;
            signed_in(&ctx, outcome)
        }
        AuthAction::SignOut => match ctx.app.sign_out().await {
            Ok(()) => {
                println!("signed out");
                Ok(())
            }
            Err(e) => Err(e.into()),
        },
        AuthAction::Status => print_json(&json!({
            "backend": ctx.config.backend.kind,
            "user": ctx.app.user(),
        })),
    };

    ctx.save()?;
    result
}

fn signed_in(ctx: &Context, outcome: Result<purrfocus_core::User, CoreError>) -> CliResult {
    let user = match outcome {
        Ok(user) => user,
        // Shown the way the sign-in form shows it.
        Err(CoreError::Auth(e)) => return Err(e.user_message().into()),
        Err(e) => return Err(e.into()),
    };
    let next = post_login_target(ctx.take_redirect()?);
    println!("signed in as {}", user.email);
    println!("continue at {next}");
    Ok(())
}
