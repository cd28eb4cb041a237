//! Patient notifications.
//!
//! Delivery is best-effort: `dispatch` runs the send on a detached task and
//! only logs failures, so a slow or broken mail relay never blocks or fails
//! the request that produced the message.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::Serialize;
use thiserror::Error;

use crate::config::Settings;

const RELAY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Mail relay unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Mail relay rejected message with status {0}")]
    Rejected(u16),
}

pub trait Notifier: Send + Sync {
    fn send<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, Result<(), NotifyError>>;

    fn name(&self) -> &'static str;
}

/// Writes messages to the log instead of delivering them.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, Result<(), NotifyError>> {
        Box::pin(async move {
            tracing::info!(
                to = %notification.to,
                subject = %notification.subject,
                "Notification (log only)"
            );
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

/// POSTs `{from, to, subject, text}` as JSON to an HTTP mail relay.
pub struct HttpNotifier {
    client: reqwest::Client,
    endpoint: String,
    from: String,
}

impl HttpNotifier {
    pub fn new(endpoint: impl Into<String>, from: impl Into<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(RELAY_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            from: from.into(),
        })
    }
}

impl Notifier for HttpNotifier {
    fn send<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, Result<(), NotifyError>> {
        Box::pin(async move {
            let message = RelayMessage {
                from: &self.from,
                to: &notification.to,
                subject: &notification.subject,
                text: &notification.body,
            };
            let response = self.client.post(&self.endpoint).json(&message).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(NotifyError::Rejected(status.as_u16()));
            }
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Pick the notifier for the configured environment: the HTTP relay when an
/// endpoint is set, the log otherwise.
pub fn from_settings(settings: &Settings) -> Result<Arc<dyn Notifier>, NotifyError> {
    match &settings.mail_endpoint {
        Some(endpoint) => Ok(Arc::new(HttpNotifier::new(endpoint.clone(), settings.mail_from.clone())?)),
        None => Ok(Arc::new(LogNotifier)),
    }
}

/// Send in the background. Failures are logged and swallowed.
pub fn dispatch(notifier: Arc<dyn Notifier>, notification: Notification) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match notifier.send(&notification).await {
            Ok(()) => tracing::debug!(
                notifier = notifier.name(),
                subject = %notification.subject,
                "Notification sent"
            ),
            Err(e) => tracing::warn!(
                notifier = notifier.name(),
                subject = %notification.subject,
                error = %e,
                "Notification failed"
            ),
        }
    })
}

/// Spanish message copy for each patient-facing event.
pub mod messages {
    use super::Notification;
    use crate::models::{Appointment, Doctor, Prescription};

    fn doctor_name(doctor: Option<&Doctor>) -> &str {
        doctor.map_or("su médico", |d| d.name.as_str())
    }

    pub fn appointment_booked(appt: &Appointment, doctor: Option<&Doctor>) -> Notification {
        Notification {
            to: appt.patient_email.clone(),
            subject: "Cita registrada".into(),
            body: format!(
                "Hola {},\n\nSu cita de {} con {} ({}) quedó registrada para el {} a las {}.\n\
                 Estado: pendiente de confirmación.",
                appt.patient_name,
                appt.specialty,
                doctor_name(doctor),
                appt.modality,
                appt.date.format("%d/%m/%Y"),
                appt.time,
            ),
        }
    }

    pub fn appointment_confirmed(appt: &Appointment, doctor: Option<&Doctor>) -> Notification {
        Notification {
            to: appt.patient_email.clone(),
            subject: "Cita confirmada".into(),
            body: format!(
                "Hola {},\n\nSu cita con {} el {} a las {} ha sido confirmada.",
                appt.patient_name,
                doctor_name(doctor),
                appt.date.format("%d/%m/%Y"),
                appt.time,
            ),
        }
    }

    pub fn appointment_cancelled(appt: &Appointment, doctor: Option<&Doctor>) -> Notification {
        Notification {
            to: appt.patient_email.clone(),
            subject: "Cita cancelada".into(),
            body: format!(
                "Hola {},\n\nSu cita con {} el {} a las {} ha sido cancelada.",
                appt.patient_name,
                doctor_name(doctor),
                appt.date.format("%d/%m/%Y"),
                appt.time,
            ),
        }
    }

    pub fn prescription_issued(
        rx: &Prescription,
        appt: &Appointment,
        doctor: Option<&Doctor>,
    ) -> Notification {
        let mut body = format!(
            "Hola {},\n\n{} le ha emitido una receta:\n\n\
             Medicamento: {}\nDosis: {}\nFrecuencia: {}\nDuración: {}\n",
            rx.patient_name,
            doctor_name(doctor),
            rx.medication,
            rx.dose,
            rx.frequency,
            rx.duration,
        );
        if let Some(instructions) = &rx.instructions {
            body.push_str(&format!("Indicaciones: {instructions}\n"));
        }
        body.push_str(&format!("\nFecha de emisión: {}", rx.issued_on.format("%d/%m/%Y")));

        Notification {
            to: appt.patient_email.clone(),
            subject: "Nueva receta médica".into(),
            body,
        }
    }
}
