use crate::config::SmtpConfig;
use crate::error::{CoreError, Result};
use crate::model::Lead;
use leadscout_scanner::{EmailValidator, Pacer};
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use tracing::{info, warn};

pub const DEFAULT_SUBJECT: &str = "Quick Introduction";
const SUBJECT_MARKER: &str = "Subject:";

const NAME_FALLBACK: &str = "there";
const COMPANY_FALLBACK: &str = "your company";
const TITLE_FALLBACK: &str = "your role";

/// A message template with `{name}`, `{company}`, `{title}`, `{phone}` and
/// `{linkedin}` tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailTemplate {
    pub subject: String,
    pub body: String,
}

impl EmailTemplate {
    /// A first line starting with `Subject:` becomes the subject; otherwise
    /// the default subject is used and the whole text is the body.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim_start_matches('\u{feff}');
        let (first, rest) = text.split_once('\n').unwrap_or((text, ""));

        let template = match first.trim_start().strip_prefix(SUBJECT_MARKER) {
            Some(subject) => {
                let subject = subject.trim();
                Self {
                    subject: if subject.is_empty() {
                        DEFAULT_SUBJECT.to_string()
                    } else {
                        subject.to_string()
                    },
                    body: rest.trim().to_string(),
                }
            }
            None => Self {
                subject: DEFAULT_SUBJECT.to_string(),
                body: text.trim().to_string(),
            },
        };

        if template.body.is_empty() {
            return Err(CoreError::Template("template body is empty".to_string()));
        }
        Ok(template)
    }

    pub fn render(&self, lead: &Lead) -> (String, String) {
        let name = lead.first_name().unwrap_or(NAME_FALLBACK);
        let company = non_empty_or(&lead.company, COMPANY_FALLBACK);
        let title = non_empty_or(&lead.title, TITLE_FALLBACK);
        let tokens = [
            ("{name}", name),
            ("{company}", company),
            ("{title}", title),
            ("{phone}", lead.phone.as_deref().unwrap_or_default()),
            ("{linkedin}", lead.linkedin_url.as_str()),
        ];

        let substitute = |text: &str| {
            tokens
                .iter()
                .fold(text.to_string(), |acc, (token, value)| acc.replace(token, value))
        };
        (substitute(&self.subject), substitute(&self.body))
    }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() { fallback } else { value }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Draft {
    pub to: String,
    pub name: String,
    pub company: String,
    pub subject: String,
    pub body: String,
}

// Complete leads only, one draft per recipient.
pub fn build_drafts(leads: &[Lead], template: &EmailTemplate, validator: &EmailValidator) -> Vec<Draft> {
    let mut seen = HashSet::new();
    leads
        .iter()
        .filter(|lead| lead.is_complete(validator))
        .filter_map(|lead| {
            let to = lead.email.as_deref()?.to_lowercase();
            if !seen.insert(to.clone()) {
                return None;
            }
            let (subject, body) = template.render(lead);
            Some(Draft {
                to,
                name: lead.name.clone(),
                company: lead.company.clone(),
                subject,
                body,
            })
        })
        .collect()
}

pub trait MailTransport {
    fn deliver(&self, draft: &Draft) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendOutcome {
    pub to: String,
    pub ok: bool,
    pub reason: String,
}

/// Sends every draft in order, pacing between messages. A failed message is
/// recorded with its reason and the batch carries on.
pub async fn send_all<T: MailTransport + Sync>(
    transport: &T,
    drafts: &[Draft],
    pacer: &Pacer,
) -> Vec<SendOutcome> {
    let mut outcomes = Vec::with_capacity(drafts.len());

    for draft in drafts {
        pacer.wait().await;
        let outcome = match transport.deliver(draft).await {
            Ok(()) => {
                info!("Sent to {}", draft.to);
                SendOutcome {
                    to: draft.to.clone(),
                    ok: true,
                    reason: "sent".to_string(),
                }
            }
            Err(e) => {
                warn!("Sending to {} failed: {}", draft.to, e);
                SendOutcome {
                    to: draft.to.clone(),
                    ok: false,
                    reason: e.to_string(),
                }
            }
        };
        outcomes.push(outcome);
    }

    outcomes
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let (username, password) = match (&config.username, &config.password) {
            (Some(u), Some(p)) if !u.trim().is_empty() && !p.is_empty() => (u.trim(), p),
            _ => {
                return Err(CoreError::MissingConfig(
                    "SMTP username and password".to_string(),
                ));
            }
        };
        let creds = Credentials::new(username.to_string(), password.to_string());

        let builder = if config.implicit_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .map_err(|e| CoreError::Mail(format!("SMTP relay {}: {}", config.host, e)))?;

        let transport = builder.port(config.port).credentials(creds).build();

        let address: Address = username
            .parse()
            .map_err(|e| CoreError::Mail(format!("invalid sender address {}: {}", username, e)))?;
        let from = Mailbox::new(config.from_name.clone(), address);

        Ok(Self { transport, from })
    }

    fn build_message(&self, draft: &Draft) -> Result<Message> {
        let to: Mailbox = draft
            .to
            .parse()
            .map_err(|e| CoreError::Mail(format!("invalid recipient {}: {}", draft.to, e)))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(draft.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(draft.body.clone())
            .map_err(|e| CoreError::Mail(e.to_string()))
    }
}

impl MailTransport for SmtpMailer {
    async fn deliver(&self, draft: &Draft) -> Result<()> {
        let message = self.build_message(draft)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| CoreError::Mail(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EmailSource;
    use std::sync::Mutex;

    fn lead(name: &str, company: &str, email: Option<&str>) -> Lead {
        Lead {
            name: name.to_string(),
            title: String::new(),
            company: company.to_string(),
            email: email.map(str::to_string),
            email_source: email.map(|_| EmailSource::Snippet),
            phone: None,
            linkedin_url: "https://www.linkedin.com/in/jane".to_string(),
            snippet: String::new(),
        }
    }

    #[test]
    fn test_subject_line_is_split_off() {
        let template = EmailTemplate::parse("Subject: Hello {company}\n\nHi {name},\nBye").unwrap();
        assert_eq!(template.subject, "Hello {company}");
        assert_eq!(template.body, "Hi {name},\nBye");
    }

    #[test]
    fn test_default_subject_without_marker() {
        let template = EmailTemplate::parse("Hi {name}").unwrap();
        assert_eq!(template.subject, DEFAULT_SUBJECT);
        assert_eq!(template.body, "Hi {name}");
    }

    #[test]
    fn test_empty_body_is_rejected() {
        assert!(matches!(
            EmailTemplate::parse("Subject: Only a subject\n"),
            Err(CoreError::Template(_))
        ));
    }

    #[test]
    fn test_render_uses_first_name_and_fallbacks() {
        let template =
            EmailTemplate::parse("Subject: For {company}\nHi {name} ({title}) at {company}, {linkedin}").unwrap();

        let (subject, body) = template.render(&lead("Jane Doe", "Acme Bank", None));
        assert_eq!(subject, "For Acme Bank");
        assert_eq!(
            body,
            "Hi Jane (your role) at Acme Bank, https://www.linkedin.com/in/jane"
        );

        let (_, body) = template.render(&lead("", "", None));
        assert!(body.starts_with("Hi there (your role) at your company"));
    }

    #[test]
    fn test_render_phone_token() {
        let template = EmailTemplate::parse("Hi {name}, is {phone} still the best number?").unwrap();

        let mut with_phone = lead("Jane Doe", "Acme Bank", None);
        with_phone.phone = Some("+971 4 123 4567".to_string());
        let (_, body) = template.render(&with_phone);
        assert_eq!(body, "Hi Jane, is +971 4 123 4567 still the best number?");

        let (_, body) = template.render(&lead("Jane Doe", "Acme Bank", None));
        assert_eq!(body, "Hi Jane, is  still the best number?");
    }

    #[test]
    fn test_drafts_only_for_complete_leads() {
        let template = EmailTemplate::parse("Hi {name}").unwrap();
        let leads = vec![
            lead("Jane Doe", "Acme", Some("jane@acme.io")),
            lead("No Email", "Acme", None),
            lead("Web Mail", "Acme", Some("someone@gmail.com")),
            lead("Jane Again", "Acme", Some("JANE@acme.io")),
        ];
        let drafts = build_drafts(&leads, &template, &EmailValidator::default());

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].to, "jane@acme.io");
        assert_eq!(drafts[0].body, "Hi Jane");
    }

    struct RecordingTransport {
        reject: &'static str,
        sent: Mutex<Vec<String>>,
    }

    impl MailTransport for RecordingTransport {
        async fn deliver(&self, draft: &Draft) -> Result<()> {
            if draft.to == self.reject {
                return Err(CoreError::Mail("550 mailbox unavailable".to_string()));
            }
            self.sent.lock().unwrap().push(draft.to.clone());
            Ok(())
        }
    }

    fn draft(to: &str) -> Draft {
        Draft {
            to: to.to_string(),
            name: String::new(),
            company: String::new(),
            subject: DEFAULT_SUBJECT.to_string(),
            body: "Hi".to_string(),
        }
    }

    #[tokio::test]
    async fn test_send_failure_does_not_stop_batch() {
        let transport = RecordingTransport {
            reject: "b@acme.io",
            sent: Mutex::new(Vec::new()),
        };
        let drafts = vec![draft("a@acme.io"), draft("b@acme.io"), draft("c@acme.io")];

        let outcomes = send_all(&transport, &drafts, &Pacer::disabled()).await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].ok);
        assert!(!outcomes[1].ok);
        assert!(outcomes[1].reason.contains("550"));
        assert!(outcomes[2].ok);
        assert_eq!(*transport.sent.lock().unwrap(), vec!["a@acme.io", "c@acme.io"]);
    }

    #[test]
    fn test_mailer_requires_credentials() {
        let config = SmtpConfig::default();
        assert!(matches!(SmtpMailer::new(&config), Err(CoreError::MissingConfig(_))));
    }

    #[tokio::test]
    async fn test_mailer_builds_with_credentials() {
        let config = SmtpConfig {
            username: Some("sales@acme.io".to_string()),
            password: Some("app password".to_string()),
            from_name: Some("Acme Sales".to_string()),
            ..Default::default()
        };
        let mailer = SmtpMailer::new(&config).unwrap();
        let message = mailer.build_message(&draft("jane@globex.com")).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("To: jane@globex.com"));
        assert!(raw.contains("Subject: Quick Introduction"));
    }
}
