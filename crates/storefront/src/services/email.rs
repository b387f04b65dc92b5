//! Email service for transactional mail.
//!
//! Uses SMTP via lettre for delivery with Askama HTML and plain text templates.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::EmailConfig;

/// HTML template for the signup confirmation.
#[derive(Template)]
#[template(path = "email/signup.html")]
struct SignupEmailHtml<'a> {
    email: &'a str,
    shop_url: &'a str,
}

/// Plain text template for the signup confirmation.
#[derive(Template)]
#[template(path = "email/signup.txt")]
struct SignupEmailText<'a> {
    email: &'a str,
    shop_url: &'a str,
}

/// HTML template for the password reset link.
#[derive(Template)]
#[template(path = "email/password_reset.html")]
struct PasswordResetEmailHtml<'a> {
    reset_url: &'a str,
}

/// Plain text template for the password reset link.
#[derive(Template)]
#[template(path = "email/password_reset.txt")]
struct PasswordResetEmailText<'a> {
    reset_url: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// With credentials configured the relay is reached over STARTTLS;
    /// without them a plain local relay (e.g. a development mail catcher) is
    /// assumed. No connection is made until the first send.
    ///
    /// # Errors
    ///
    /// Returns error if the relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let mailer = match (&config.smtp_username, &config.smtp_password) {
            (Some(username), Some(password)) => {
                let credentials =
                    Credentials::new(username.clone(), password.expose_secret().to_string());
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
                    .port(config.smtp_port)
                    .credentials(credentials)
                    .build()
            }
            _ => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
                .port(config.smtp_port)
                .build(),
        };

        Ok(Self {
            mailer,
            from_address: config.from.clone(),
        })
    }

    /// Send the signup confirmation.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_signup_succeeded(&self, to: &str, shop_url: &str) -> Result<(), EmailError> {
        let html = SignupEmailHtml {
            email: to,
            shop_url,
        }
        .render()?;
        let text = SignupEmailText {
            email: to,
            shop_url,
        }
        .render()?;

        self.send_multipart_email(to, "Signup Succeeded!", &text, &html)
            .await
    }

    /// Send a password reset link.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_password_reset(&self, to: &str, reset_url: &str) -> Result<(), EmailError> {
        let html = PasswordResetEmailHtml { reset_url }.render()?;
        let text = PasswordResetEmailText { reset_url }.render()?;

        self.send_multipart_email(to, "Password Reset", &text, &html)
            .await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}
