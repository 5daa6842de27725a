//! Email service for password reset links

use anyhow::{anyhow, Result};
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};

use crate::config::MailConfig;

/// Sends mail over SMTP using the `mail` config section
pub struct EmailService {
    config: MailConfig,
}

impl EmailService {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Link the user follows to choose a new password
    pub fn reset_link(&self, token: &str) -> String {
        let base = self.config.reset_url_base.trim_end_matches('/');
        if base.contains('?') {
            format!("{}&token={}", base, token)
        } else {
            format!("{}?token={}", base, token)
        }
    }

    /// Send the reset link. With mail disabled this only logs a warning.
    pub async fn send_password_reset(
        &self,
        to_email: &str,
        token: &str,
        ttl_minutes: i64,
    ) -> Result<()> {
        if !self.config.enabled {
            tracing::warn!(
                "Mail is disabled; password reset link for {} was not sent",
                to_email
            );
            return Ok(());
        }

        let body = format!(
            "Hello,\n\nA password reset was requested for your account.\n\n\
             Open this link to choose a new password:\n{}\n\n\
             The link is valid for {} minutes. If you did not request this, ignore this email.\n\n\
             {}",
            self.reset_link(token),
            ttl_minutes,
            self.config.from_name
        );

        self.send(
            to_email,
            &format!("[{}] Password reset", self.config.from_name),
            body,
        )
        .await
    }

    async fn send(&self, to_email: &str, subject: &str, body: String) -> Result<()> {
        if self.config.smtp_host.is_empty() {
            return Err(anyhow!("SMTP host not configured"));
        }

        let from = format!("{} <{}>", self.config.from_name, self.config.from_address);
        let email = Message::builder()
            .from(from.parse().map_err(|e| anyhow!("Invalid from address: {}", e))?)
            .to(to_email
                .parse()
                .map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        let creds = Credentials::new(
            self.config.smtp_username.clone(),
            self.config.smtp_password.clone(),
        );

        let mailer: AsyncSmtpTransport<Tokio1Executor> =
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)
                .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
                .credentials(creds)
                .port(self.config.smtp_port)
                .build();

        mailer
            .send(email)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_link() {
        let service = EmailService::new(MailConfig {
            reset_url_base: "https://blog.example.com/reset/".to_string(),
            ..MailConfig::default()
        });
        assert_eq!(
            service.reset_link("abc"),
            "https://blog.example.com/reset?token=abc"
        );

        let service = EmailService::new(MailConfig {
            reset_url_base: "https://blog.example.com/#/reset?lang=en".to_string(),
            ..MailConfig::default()
        });
        assert_eq!(
            service.reset_link("abc"),
            "https://blog.example.com/#/reset?lang=en&token=abc"
        );
    }

    #[tokio::test]
    async fn test_disabled_mail_is_not_an_error() {
        let service = EmailService::new(MailConfig::default());
        assert!(!service.is_enabled());
        service
            .send_password_reset("someone@example.com", "token", 60)
            .await
            .expect("Disabled mail should succeed");
    }

    #[tokio::test]
    async fn test_enabled_mail_without_host_fails() {
        let service = EmailService::new(MailConfig {
            enabled: true,
            smtp_host: String::new(),
            ..MailConfig::default()
        });
        assert!(service
            .send_password_reset("someone@example.com", "token", 60)
            .await
            .is_err());
    }
}
