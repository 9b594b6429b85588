//! Owner-facing reports and their delivery.

use std::path::PathBuf;

use async_trait::async_trait;
use config::MailConfig;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use model_structs::ModelSchema;
use tracing::debug;

use super::{MismatchKind, MonitorError, SchemaMismatch, Verdict};

/// What happened when a due model was tested.
#[derive(Debug, Clone)]
pub enum TestOutcome {
    /// The inbox held no test file.
    NoData { inbox: PathBuf, schema: ModelSchema },
    /// The oldest file could not be used.
    SchemaMismatch {
        inbox: PathBuf,
        schema: ModelSchema,
        mismatch: SchemaMismatch,
    },
    Scored {
        mae: f64,
        baseline: f64,
        verdict: Verdict,
    },
    /// The cycle stopped before a verdict could be reached.
    Fault { reason: String },
}

/// A rendered message for a model owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub subject: String,
    pub body: String,
}

impl Report {
    #[must_use]
    pub fn render(model_name: &str, outcome: &TestOutcome) -> Self {
        match outcome {
            TestOutcome::NoData { inbox, schema } => Self {
                subject: "Mathfinder did not find your test data".to_string(),
                body: format!(
                    "Mathfinder tried to test your model {model_name} to ensure it still retains \
                     good performance, but no testing data was found.\n{}",
                    data_instructions(inbox, schema)
                ),
            },
            TestOutcome::SchemaMismatch {
                inbox,
                schema,
                mismatch,
            } => {
                let problem = match &mismatch.kind {
                    MismatchKind::MissingColumns(missing) => {
                        format!("it lacks the columns {}", missing.join(", "))
                    }
                    MismatchKind::Malformed(reason) => format!("it could not be read: {reason}"),
                };
                Self {
                    subject: "Mathfinder could not use your test data".to_string(),
                    body: format!(
                        "Mathfinder tried to test your model {model_name} with the file {}, but \
                         {problem}.\nThe file was left in place; replace or remove it so the next \
                         test can run.\n{}",
                        mismatch.file_name,
                        data_instructions(inbox, schema)
                    ),
                }
            }
            TestOutcome::Scored {
                mae,
                baseline,
                verdict,
            } => {
                let (subject, opening) = match verdict {
                    Verdict::Pass => (
                        "Your model passed the test",
                        format!(
                            "Congratulations, your model {model_name} is doing well!\nMathfinder \
                             tested your model automatically using the testing data you provided, \
                             and its performance is still good."
                        ),
                    ),
                    Verdict::Fail => (
                        "Your model failed the test",
                        format!(
                            "Your model {model_name} needs to be retrained!\nMathfinder tested \
                             your model automatically using the testing data you provided, and its \
                             performance metrics went down. Please retrain your model using recent \
                             data whenever you have the chance."
                        ),
                    ),
                };
                Self {
                    subject: subject.to_string(),
                    body: format!(
                        "{opening}\nOriginal mean absolute error (MAE): {baseline}\nMAE with the \
                         latest test: {mae}\nAcceptability threshold: 105% of the original MAE"
                    ),
                }
            }
            TestOutcome::Fault { reason } => Self {
                subject: "Mathfinder could not test your model".to_string(),
                body: format!(
                    "Mathfinder tried to test your model {model_name} but the test could not run: \
                     {reason}\nAny test data in the inbox was left in place and will be used on a \
                     later attempt."
                ),
            },
        }
    }
}

fn data_instructions(inbox: &std::path::Path, schema: &ModelSchema) -> String {
    format!(
        "Please ensure that:\n- there is at least one CSV file with test data in the {} folder\n\
         - this CSV file has one column for each input ({}) and one for each target ({}), named \
         as in the data the model was trained on.",
        inbox.display(),
        schema.features,
        schema.targets
    )
}

/// Delivers reports to model owners.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Sends `report` to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Mail`] if the address is invalid or delivery fails.
    async fn send(&self, to: &str, report: &Report) -> Result<(), MonitorError>;
}

/// Mail delivery through an authenticated SMTP relay over implicit TLS.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpMailer {
    /// Builds a relay transport. No connection is opened until the first send.
    ///
    /// # Errors
    ///
    /// Returns an error if the sender address or relay host is invalid.
    pub fn new(config: &MailConfig) -> Result<Self, MonitorError> {
        let sender: Mailbox = config
            .sender
            .parse()
            .map_err(|e| MonitorError::Mail(format!("invalid sender '{}': {e}", config.sender)))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.server)
            .map_err(|e| MonitorError::Mail(format!("invalid relay '{}': {e}", config.server)))?
            .port(config.port)
            .credentials(Credentials::new(
                config.login.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self { transport, sender })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, report: &Report) -> Result<(), MonitorError> {
        let recipient: Mailbox = to
            .parse()
            .map_err(|e| MonitorError::Mail(format!("invalid recipient '{to}': {e}")))?;

        let message = Message::builder()
            .from(self.sender.clone())
            .to(recipient)
            .subject(report.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(report.body.clone())
            .map_err(|e| MonitorError::Mail(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MonitorError::Mail(e.to_string()))?;

        debug!(to, subject = %report.subject, "Report delivered");
        Ok(())
    }
}
