//! Authentication route handlers.
//!
//! Signup, login and logout, plus the password reset flow:
//! `POST /reset` emails a link to `/reset/{token}`, whose form posts to
//! `/set-password`.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use bazaar_core::{Email, UserId};

use super::PageContext;
use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::middleware::{clear_current_user, set_current_user, verify_csrf};
use crate::models::CurrentUser;
use crate::services::AuthError;
use crate::services::auth::AuthService;
use crate::services::validation::{
    EMAIL_TAKEN, ValidationErrors, validate_login, validate_signup,
};
use crate::state::AppState;

const INVALID_LOGIN: &str = "Invalid email or password.";

// =============================================================================
// Form Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(rename = "_csrf")]
    pub csrf: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, rename = "confirmPassword")]
    pub confirm_password: String,
    #[serde(rename = "_csrf")]
    pub csrf: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetForm {
    #[serde(default)]
    pub email: String,
    #[serde(rename = "_csrf")]
    pub csrf: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewPasswordForm {
    #[serde(default)]
    pub password: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "passwordToken")]
    pub token: String,
    #[serde(rename = "_csrf")]
    pub csrf: Option<String>,
}

/// `?error=` and `?notice=` codes set by redirects.
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
    pub notice: Option<String>,
}

fn error_message(code: &str) -> &'static str {
    match code {
        "unknown_email" => "No account with that email found.",
        "link_expired" => "The reset link is broken or has expired.",
        _ => "Something went wrong, please try again.",
    }
}

fn notice_message(code: &str) -> Option<&'static str> {
    match code {
        "signed_up" => Some("Signup succeeded, you can log in now."),
        "reset_sent" => Some("Check your inbox for a link to reset your password."),
        "password_updated" => Some("Your password was updated."),
        _ => None,
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub ctx: PageContext,
    pub error: Option<String>,
    pub notice: Option<String>,
    pub old_email: String,
    pub invalid_email: bool,
    pub invalid_password: bool,
}

/// Signup page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/signup.html")]
pub struct SignupTemplate {
    pub ctx: PageContext,
    pub error: Option<String>,
    pub old_email: String,
    pub invalid_email: bool,
    pub invalid_password: bool,
    pub invalid_confirm: bool,
}

/// Reset request page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/reset.html")]
pub struct ResetTemplate {
    pub ctx: PageContext,
    pub error: Option<String>,
}

/// Set-new-password page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/new_password.html")]
pub struct NewPasswordTemplate {
    pub ctx: PageContext,
    pub error: Option<String>,
    pub user_id: UserId,
    pub token: String,
}

impl LoginTemplate {
    fn rejected(ctx: PageContext, email: &str, errors: &ValidationErrors) -> Response {
        let page = Self {
            ctx,
            error: errors.first_message().map(str::to_owned),
            notice: None,
            old_email: email.to_owned(),
            invalid_email: errors.has("email"),
            invalid_password: errors.has("password"),
        };
        (StatusCode::UNPROCESSABLE_ENTITY, page).into_response()
    }
}

impl SignupTemplate {
    fn rejected(ctx: PageContext, email: &str, errors: &ValidationErrors) -> Response {
        let page = Self {
            ctx,
            error: errors.first_message().map(str::to_owned),
            old_email: email.to_owned(),
            invalid_email: errors.has("email"),
            invalid_password: errors.has("password"),
            invalid_confirm: errors.has("confirmPassword"),
        };
        (StatusCode::UNPROCESSABLE_ENTITY, page).into_response()
    }
}

// =============================================================================
// Login / Logout
// =============================================================================

/// Display the login page.
pub async fn login_page(ctx: PageContext, Query(query): Query<MessageQuery>) -> impl IntoResponse {
    LoginTemplate {
        ctx,
        error: query.error.as_deref().map(|c| error_message(c).to_owned()),
        notice: query
            .notice
            .as_deref()
            .and_then(notice_message)
            .map(str::to_owned),
        old_email: String::new(),
        invalid_email: false,
        invalid_password: false,
    }
}

/// Handle login form submission.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    ctx: PageContext,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    verify_csrf(&session, form.csrf.as_deref()).await?;

    let email = match validate_login(&form.email, &form.password) {
        Ok(email) => email,
        Err(errors) => return Ok(LoginTemplate::rejected(ctx, &form.email, &errors)),
    };

    let user = match AuthService::new(state.pool())
        .login_with_password(&email, &form.password)
        .await
    {
        Ok(user) => user,
        Err(AuthError::InvalidCredentials) => {
            tracing::info!("Login failed: invalid credentials");
            let errors = ValidationErrors::single("password", INVALID_LOGIN);
            return Ok(LoginTemplate::rejected(ctx, &form.email, &errors));
        }
        Err(e) => return Err(e.into()),
    };

    let current = CurrentUser {
        id: user.id,
        email: user.email,
    };
    set_current_user(&session, &current).await?;
    set_sentry_user(&current.id, Some(current.email.as_str()));

    tracing::info!(user_id = %current.id, "User logged in");
    Ok(Redirect::to("/").into_response())
}

/// Logout form.
#[derive(Debug, Deserialize)]
pub struct LogoutForm {
    #[serde(rename = "_csrf")]
    pub csrf: Option<String>,
}

/// Handle logout.
pub async fn logout(session: Session, Form(form): Form<LogoutForm>) -> Result<Redirect, AppError> {
    verify_csrf(&session, form.csrf.as_deref()).await?;
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(Redirect::to("/login"))
}

// =============================================================================
// Signup
// =============================================================================

/// Display the signup page.
pub async fn signup_page(ctx: PageContext) -> impl IntoResponse {
    SignupTemplate {
        ctx,
        error: None,
        old_email: String::new(),
        invalid_email: false,
        invalid_password: false,
        invalid_confirm: false,
    }
}

/// Handle signup form submission.
///
/// On success the confirmation email is sent in the background.
#[instrument(skip_all)]
pub async fn signup(
    State(state): State<AppState>,
    session: Session,
    ctx: PageContext,
    Form(form): Form<SignupForm>,
) -> Result<Response, AppError> {
    verify_csrf(&session, form.csrf.as_deref()).await?;

    let email = match validate_signup(&form.email, &form.password, &form.confirm_password) {
        Ok(email) => email,
        Err(errors) => return Ok(SignupTemplate::rejected(ctx, &form.email, &errors)),
    };

    let auth = AuthService::new(state.pool());
    let taken = || ValidationErrors::single("email", EMAIL_TAKEN);

    if auth.email_taken(&email).await? {
        return Ok(SignupTemplate::rejected(ctx, &form.email, &taken()));
    }

    let user = match auth.register_with_password(&email, &form.password).await {
        Ok(user) => user,
        Err(AuthError::UserAlreadyExists) => {
            return Ok(SignupTemplate::rejected(ctx, &form.email, &taken()));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(user_id = %user.id, "User signed up");
    send_signup_email(&state, user.email);

    Ok(Redirect::to("/login?notice=signed_up").into_response())
}

fn send_signup_email(state: &AppState, to: Email) {
    let mailer = state.email().clone();
    let shop_url = state.config().url_for("/");
    tokio::spawn(async move {
        if let Err(e) = mailer.send_signup_succeeded(to.as_str(), &shop_url).await {
            tracing::error!(error = %e, "Failed to send signup email");
        }
    });
}

// =============================================================================
// Password Reset
// =============================================================================

/// Display the reset request page.
pub async fn reset_page(ctx: PageContext, Query(query): Query<MessageQuery>) -> impl IntoResponse {
    ResetTemplate {
        ctx,
        error: query.error.as_deref().map(|c| error_message(c).to_owned()),
    }
}

/// Issue a reset token and email the link.
#[instrument(skip_all)]
pub async fn reset(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<ResetForm>,
) -> Result<Redirect, AppError> {
    verify_csrf(&session, form.csrf.as_deref()).await?;

    let Ok(email) = Email::parse(&form.email) else {
        return Ok(Redirect::to("/reset?error=unknown_email"));
    };

    let Some((user, token)) = AuthService::new(state.pool())
        .start_password_reset(&email)
        .await?
    else {
        return Ok(Redirect::to("/reset?error=unknown_email"));
    };

    let mailer = state.email().clone();
    let reset_url = state.config().url_for(&format!("/reset/{token}"));
    let to = user.email;
    tokio::spawn(async move {
        if let Err(e) = mailer.send_password_reset(to.as_str(), &reset_url).await {
            tracing::error!(error = %e, "Failed to send password reset email");
        }
    });

    tracing::info!(user_id = %user.id, "Password reset requested");
    Ok(Redirect::to("/login?notice=reset_sent"))
}

/// Display the set-password form for a valid reset link.
#[instrument(skip_all)]
pub async fn new_password_page(
    State(state): State<AppState>,
    ctx: PageContext,
    Path(token): Path<String>,
) -> Result<Response, AppError> {
    match AuthService::new(state.pool()).check_reset_token(&token).await {
        Ok(user) => Ok(NewPasswordTemplate {
            ctx,
            error: None,
            user_id: user.id,
            token,
        }
        .into_response()),
        Err(AuthError::InvalidResetToken) => {
            Ok(Redirect::to("/reset?error=link_expired").into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// Store the new password and consume the reset token.
#[instrument(skip_all)]
pub async fn set_password(
    State(state): State<AppState>,
    session: Session,
    ctx: PageContext,
    Form(form): Form<NewPasswordForm>,
) -> Result<Response, AppError> {
    verify_csrf(&session, form.csrf.as_deref()).await?;

    let Ok(user_id) = form.user_id.parse::<UserId>() else {
        return Ok(Redirect::to("/reset?error=link_expired").into_response());
    };

    match AuthService::new(state.pool())
        .complete_password_reset(user_id, &form.token, &form.password)
        .await
    {
        Ok(()) => {
            tracing::info!(user_id = %user_id, "Password reset completed");
            Ok(Redirect::to("/login?notice=password_updated").into_response())
        }
        Err(AuthError::WeakPassword(message)) => {
            let page = NewPasswordTemplate {
                ctx,
                error: Some(message),
                user_id,
                token: form.token,
            };
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
        Err(AuthError::InvalidResetToken) => {
            Ok(Redirect::to("/reset?error=link_expired").into_response())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_codes() {
        assert_eq!(error_message("link_expired"), "The reset link is broken or has expired.");
        assert_eq!(error_message("bogus"), "Something went wrong, please try again.");
        assert!(notice_message("signed_up").is_some());
        assert!(notice_message("bogus").is_none());
    }
}
