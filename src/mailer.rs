#[cfg(feature = "web")]
use lettre::transport::smtp::authentication::Credentials;
#[cfg(feature = "web")]
use lettre::transport::smtp::client::{Tls, TlsParameters};
#[cfg(feature = "web")]
use lettre::{Message, SmtpTransport, Transport};
use rand::Rng;

#[cfg(feature = "web")]
use crate::config::SmtpConfig;
#[cfg(feature = "web")]
use crate::error::{NackError, Result};

/// Characters used in password reset codes
const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const RESET_CODE_LEN: usize = 8;

/// Outgoing mail over an implicit-TLS SMTP relay
///
/// Sends are blocking; async callers go through `spawn_blocking`.
#[cfg(feature = "web")]
#[derive(Clone)]
pub struct Mailer {
    smtp: SmtpTransport,
    from: String,
}

#[cfg(feature = "web")]
impl Mailer {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());

        let tls_parameters =
            TlsParameters::new(config.host.clone()).map_err(|e| NackError::Mail(e.to_string()))?;

        let smtp = SmtpTransport::relay(&config.host)
            .map_err(|e| NackError::Mail(e.to_string()))?
            .credentials(creds)
            .port(config.port)
            .tls(Tls::Wrapper(tls_parameters))
            .build();

        Ok(Mailer {
            smtp,
            from: config.from.clone(),
        })
    }

    fn send(&self, to_email: &str, subject: &str, body: String) -> Result<()> {
        let email = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| NackError::Mail(format!("bad sender address: {}", e)))?,
            )
            .to(to_email
                .parse()
                .map_err(|e| NackError::Mail(format!("bad recipient address: {}", e)))?)
            .subject(subject)
            .body(body)
            .map_err(|e| NackError::Mail(e.to_string()))?;

        self.smtp
            .send(&email)
            .map_err(|e| NackError::Mail(e.to_string()))?;
        Ok(())
    }

    pub fn send_password_reset(&self, to_email: &str, reset_code: &str) -> Result<()> {
        self.send(
            to_email,
            "Nack! - Réinitialisation du mot de passe",
            format!(
                "Votre code de réinitialisation est : {}\nCe code expire dans 1 heure.",
                reset_code
            ),
        )
    }

    pub fn send_subscription_receipt(
        &self,
        to_email: &str,
        establishment_name: &str,
        amount: &str,
        ends_at: &str,
    ) -> Result<()> {
        self.send(
            to_email,
            "Nack! - Abonnement confirmé",
            format!(
                "Merci {} !\nNous avons bien reçu votre paiement de {}.\nVotre abonnement est actif jusqu'au {}.",
                establishment_name, amount, ends_at
            ),
        )
    }
}

pub fn generate_reset_code() -> String {
    let mut rng = rand::thread_rng();

    (0..RESET_CODE_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..CODE_CHARSET.len());
            CODE_CHARSET[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_codes_use_the_charset() {
        let code = generate_reset_code();
        assert_eq!(code.len(), RESET_CODE_LEN);
        assert!(code.bytes().all(|b| CODE_CHARSET.contains(&b)));
    }
}
