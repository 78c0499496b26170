//! Email service for quote delivery.
//!
//! Uses SMTP via lettre for delivery with Askama HTML templates.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{
        Attachment, MultiPart, SinglePart,
        header::{ContentType, HeaderName, HeaderValue},
    },
    transport::smtp::{
        Error as SmtpError,
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::EmailConfig;

/// Prefix of headers carrying message tags.
pub const TAG_HEADER_PREFIX: &str = "X-KatanaForge-";

/// HTML template for the quote email.
#[derive(Template)]
#[template(path = "email/quote.html")]
struct QuoteEmailHtml<'a> {
    name: &'a str,
    quote_number: &'a str,
    pay_link: &'a str,
}

/// Plain text template for the quote email.
#[derive(Template)]
#[template(path = "email/quote.txt")]
struct QuoteEmailText<'a> {
    name: &'a str,
    quote_number: &'a str,
    pay_link: &'a str,
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

    /// Tag key not usable in a header name.
    #[error("Invalid tag: {0}")]
    InvalidTag(String),

    /// Attachment content type rejected.
    #[error("Invalid content type: {0}")]
    ContentType(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// A quote ready to be mailed.
#[derive(Debug, Clone, Copy)]
pub struct QuoteEmail<'a> {
    pub to: &'a str,
    pub name: &'a str,
    pub quote_number: &'a str,
    pub pay_link: &'a str,
    pub pdf: &'a [u8],
    pub tags: &'a [(&'a str, &'a str)],
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
    /// Port 465 uses implicit TLS; other ports upgrade with STARTTLS when
    /// the server offers it, which keeps local catchers working.
    ///
    /// # Errors
    ///
    /// Returns error if the TLS parameters cannot be built.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let mut builder = if config.implicit_tls() {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host).tls(
                Tls::Opportunistic(TlsParameters::new(config.smtp_host.clone())?),
            )
        }
        .port(config.smtp_port);

        if let Some((user, pass)) = config.credentials() {
            builder = builder.credentials(Credentials::new(
                user.to_string(),
                pass.expose_secret().to_string(),
            ));
        }

        Ok(Self {
            mailer: builder.build(),
            from_address: config.from_address.clone(),
        })
    }

    /// Send a quote with its PDF attached.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_quote(&self, email: &QuoteEmail<'_>) -> Result<(), EmailError> {
        let message = build_quote_message(&self.from_address, email)?;
        self.mailer.send(message).await?;

        tracing::info!(
            to = %email.to,
            quote_number = %email.quote_number,
            "Quote email sent"
        );
        Ok(())
    }
}

/// Build the multipart quote message: text and HTML alternatives plus the
/// PDF attachment, with tags as `X-KatanaForge-<key>` headers.
fn build_quote_message(from: &str, email: &QuoteEmail<'_>) -> Result<Message, EmailError> {
    let html = QuoteEmailHtml {
        name: email.name,
        quote_number: email.quote_number,
        pay_link: email.pay_link,
    }
    .render()?;
    let text = QuoteEmailText {
        name: email.name,
        quote_number: email.quote_number,
        pay_link: email.pay_link,
    }
    .render()?;

    let pdf_type = ContentType::parse("application/pdf")
        .map_err(|e| EmailError::ContentType(e.to_string()))?;

    let mut message = Message::builder()
        .from(
            from.parse()
                .map_err(|_| EmailError::InvalidAddress(from.to_string()))?,
        )
        .to(email
            .to
            .parse()
            .map_err(|_| EmailError::InvalidAddress(email.to.to_string()))?)
        .subject(format!("Votre devis {}", email.quote_number))
        .multipart(
            MultiPart::mixed()
                .multipart(
                    MultiPart::alternative()
                        .singlepart(
                            SinglePart::builder()
                                .header(ContentType::TEXT_PLAIN)
                                .body(text),
                        )
                        .singlepart(
                            SinglePart::builder()
                                .header(ContentType::TEXT_HTML)
                                .body(html),
                        ),
                )
                .singlepart(
                    Attachment::new(format!("{}.pdf", email.quote_number))
                        .body(email.pdf.to_vec(), pdf_type),
                ),
        )?;

    for (key, value) in email.tags {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(EmailError::InvalidTag((*key).to_string()));
        }
        let name = HeaderName::new_from_ascii(format!("{TAG_HEADER_PREFIX}{key}"))
            .map_err(|_| EmailError::InvalidTag((*key).to_string()))?;
        message
            .headers_mut()
            .insert_raw(HeaderValue::new(name, (*value).to_string()));
    }

    Ok(message)
}
