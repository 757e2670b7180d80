use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use log::{error, info, warn};

/// Fire-and-forget notifications. Every public helper returns a bool and
/// logs failures; payment flows must never fail because SMTP did.
pub struct EmailService;

impl EmailService {
    pub async fn send_welcome_email(email: &str, first_name: &str) -> bool {
        let subject = "Welcome to the Academy".to_string();
        let body = format!(
            r#"
            <!DOCTYPE html>
            <html>
            <body>
                <h1>Welcome to the Academy!</h1>
                <p>Hi {},</p>
                <p>Your account has been created. The next step is paying the
                application fee, after which you can pick a payment plan and
                enroll for the program.</p>
                <p>Best regards,<br><strong>The Academy Team</strong></p>
            </body>
            </html>
            "#,
            if first_name.is_empty() { "there" } else { first_name }
        );

        Self::send(email, subject, body).await
    }

    pub async fn send_payment_confirmation(
        email: &str,
        first_name: &str,
        amount: f64,
        reference: &str,
        current_semester: i32,
        amount_remaining: f64,
    ) -> bool {
        let subject = "Payment received".to_string();
        let balance_line = if amount_remaining > 0.0 {
            format!("Outstanding balance: ₦{:.2}", amount_remaining)
        } else {
            "Your program fees are fully paid. Welcome aboard!".to_string()
        };
        let body = format!(
            r#"
            <!DOCTYPE html>
            <html>
            <body>
                <h1>Payment Confirmation</h1>
                <p>Hi {},</p>
                <p>We received your payment of <strong>₦{:.2}</strong>
                (reference <code>{}</code>).</p>
                <p>You are now covered through semester {} of 4.</p>
                <p>{}</p>
                <p>Best regards,<br><strong>The Academy Team</strong></p>
            </body>
            </html>
            "#,
            first_name, amount, reference, current_semester, balance_line
        );

        Self::send(email, subject, body).await
    }

    pub async fn send_application_fee_receipt(
        email: &str,
        first_name: &str,
        amount: f64,
        reference: &str,
    ) -> bool {
        let subject = "Application fee received".to_string();
        let body = format!(
            r#"
            <!DOCTYPE html>
            <html>
            <body>
                <h1>Application Fee Receipt</h1>
                <p>Hi {},</p>
                <p>Your application fee of <strong>₦{:.2}</strong> has been
                received (reference <code>{}</code>). You can now select a
                payment plan and begin enrollment.</p>
                <p>Best regards,<br><strong>The Academy Team</strong></p>
            </body>
            </html>
            "#,
            first_name, amount, reference
        );

        Self::send(email, subject, body).await
    }

    async fn send(email: &str, subject: String, body: String) -> bool {
        match Self::try_send(email, &subject, body).await {
            Ok(_) => {
                info!("Email '{}' sent to {}", subject, email);
                true
            }
            Err(e) => {
                error!("Failed to send '{}' to {}: {}", subject, email, e);
                false
            }
        }
    }

    async fn try_send(
        email: &str,
        subject: &str,
        body: String,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mail_user = crate::config::Config::mail_user();
        let mail_password = crate::config::Config::mail_password();

        if mail_user.is_empty() || mail_password.is_empty() {
            warn!("Email credentials not configured. Skipping email send.");
            return Err("Email not configured".into());
        }

        let from_mailbox: Mailbox = crate::config::Config::mail_from().parse()?;
        let to_mailbox: Mailbox = email.parse()?;

        let email_message = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body)?;

        let creds = Credentials::new(mail_user, mail_password);
        let mailer = SmtpTransport::relay(&crate::config::Config::mail_host())?
            .credentials(creds)
            .build();

        mailer.send(&email_message)?;
        Ok(())
    }
}
