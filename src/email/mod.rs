use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::{EmailBackend, EmailConfig};
use crate::error::{AppError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<()>;
}

/// Picks the backend named in the configuration.
pub fn from_settings(config: &EmailConfig) -> Result<Box<dyn EmailSender>> {
    match config.backend {
        EmailBackend::Console => Ok(Box::new(ConsoleEmailSender::new(&config.from_address))),
        EmailBackend::Smtp => Ok(Box::new(SmtpEmailSender::new(config)?)),
    }
}

/// Prints messages to stdout instead of delivering them. Default in
/// development. Bodies carry reset links, so the log only gets a summary.
pub struct ConsoleEmailSender {
    from: String,
}

impl ConsoleEmailSender {
    pub fn new(from: &str) -> Self {
        Self { from: from.to_string() }
    }

    fn render(&self, email: &OutgoingEmail) -> String {
        format!(
            "From: {}\nTo: {}\nSubject: {}\n\n{}\n{}\n",
            self.from,
            email.to,
            email.subject,
            email.body,
            "-".repeat(72)
        )
    }
}

#[async_trait]
impl EmailSender for ConsoleEmailSender {
    async fn send(&self, email: OutgoingEmail) -> Result<()> {
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(self.render(&email).as_bytes())
            .await
            .map_err(|e| AppError::Email(e.to_string()))?;
        stdout.flush().await.map_err(|e| AppError::Email(e.to_string()))?;

        tracing::info!(to = %email.to, subject = %email.subject, "Email printed by console backend");
        Ok(())
    }
}

pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailSender {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| AppError::Email(format!("Invalid SMTP relay {}: {}", config.host, e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        let mut builder = builder.port(config.port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        let from = config.from_address
            .parse::<Mailbox>()
            .map_err(|e| AppError::Email(format!("Invalid from address: {}", e)))?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, email: OutgoingEmail) -> Result<()> {
        let to = email.to
            .parse::<Mailbox>()
            .map_err(|e| AppError::Email(format!("Invalid recipient: {}", e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body)
            .map_err(|e| AppError::Email(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Email(e.to_string()))?;

        tracing::info!(to = %email.to, subject = %email.subject, "Email sent");
        Ok(())
    }
}

pub fn password_reset_email(to: &str, display_name: &str, link: &str, timeout_hours: i64) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: "Redefinição de senha - Intranet ACJogos-RJ".to_string(),
        body: format!(
            "Olá, {display_name}.\n\n\
             Recebemos um pedido para redefinir a senha da sua conta na intranet da ACJogos-RJ.\n\
             Para escolher uma nova senha, acesse o link abaixo:\n\n\
             {link}\n\n\
             O link vale por {timeout_hours} horas e só pode ser usado uma vez.\n\
             Se você não fez este pedido, ignore esta mensagem.\n\n\
             Equipe ACJogos-RJ"
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tracing_subscriber::fmt::MakeWriter;

    use super::*;

    #[test]
    fn test_reset_email_contains_link() {
        let email = password_reset_email(
            "ana@example.com",
            "Ana",
            "http://localhost:8000/reset/abc/def/",
            72,
        );
        assert_eq!(email.to, "ana@example.com");
        assert!(email.body.contains("http://localhost:8000/reset/abc/def/"));
        assert!(email.body.contains("72 horas"));
    }

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLog {
        type Writer = CapturedLog;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_console_rendering_keeps_the_link() {
        let sender = ConsoleEmailSender::new("intranet@acjogos.example");
        let email = password_reset_email("x@example.com", "X", "http://l/reset/a/b/", 1);
        let rendered = sender.render(&email);
        assert!(rendered.starts_with("From: intranet@acjogos.example\nTo: x@example.com\n"));
        assert!(rendered.contains("http://l/reset/a/b/"));
    }

    #[tokio::test]
    async fn test_console_backend_keeps_tokens_out_of_the_log() {
        let log = CapturedLog::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(log.clone())
            .with_max_level(tracing::Level::TRACE)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let sender = from_settings(&EmailConfig::default()).unwrap();
        let email = password_reset_email(
            "x@example.com",
            "X",
            "http://l/reset/AAAA/segredo-do-token/",
            1,
        );
        assert!(sender.send(email).await.is_ok());

        let logged = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("x@example.com"));
        assert!(!logged.contains("segredo-do-token"));
    }
}
