//! Sign-in, sign-up and session commands.

use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{Context, Result, bail};
use taskdesk_core::auth::TokenKind;
use taskdesk_core::auth::token_store::mask_token;
use taskdesk_core::session::{SessionManager, SessionStatus};
use taskdesk_core::tasks::format_created_at;
use taskdesk_core::validation::{SignInForm, SignUpForm, ValidationErrors};

pub async fn signin(session: &SessionManager, email: String, password: Option<String>) -> Result<()> {
    let form = SignInForm {
        email: email.trim().to_string(),
        password: resolve_password(password)?,
    };
    form.validate().map_err(invalid_input)?;

    let user = session.sign_in(&form.email, &form.password).await?;
    println!("Signed in as {} <{}>", user.name, user.email);
    Ok(())
}

pub async fn signup(
    session: &SessionManager,
    name: String,
    email: String,
    password: Option<String>,
) -> Result<()> {
    let form = SignUpForm {
        name: name.trim().to_string(),
        email: email.trim().to_string(),
        password: resolve_password(password)?,
    };
    form.validate().map_err(invalid_input)?;

    let user = session
        .sign_up(&form.name, &form.email, &form.password)
        .await?;
    println!("Account created. Signed in as {} <{}>", user.name, user.email);
    Ok(())
}

pub async fn signout(session: &SessionManager) -> Result<()> {
    session.sign_out().await;
    println!("Signed out");
    Ok(())
}

pub async fn whoami(session: &SessionManager) -> Result<()> {
    if session.restore().await != SessionStatus::Authenticated {
        bail!("Not signed in. Run `taskdesk signin` first.");
    }
    let Some(user) = session.user() else {
        bail!("Not signed in. Run `taskdesk signin` first.");
    };

    println!("{} <{}>", user.name, user.email);
    println!("  id:           {}", user.id);
    println!("  member since: {}", format_created_at(&user.created_at));
    if let Some(token) = session.client().token(TokenKind::Access) {
        println!("  token:        {}", mask_token(&token));
    }
    Ok(())
}

fn invalid_input(errors: ValidationErrors) -> anyhow::Error {
    anyhow::anyhow!("Invalid input: {errors}")
}

/// Uses the flag when given, otherwise reads one line from stdin.
fn resolve_password(flag: Option<String>) -> Result<String> {
    if let Some(password) = flag {
        return Ok(password);
    }

    let stdin = io::stdin();
    if stdin.is_terminal() {
        eprint!("Password: ");
        io::stderr().flush().ok();
    }
    let mut line = String::new();
    stdin
        .lock()
        .read_line(&mut line)
        .context("read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
