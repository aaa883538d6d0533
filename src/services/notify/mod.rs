pub mod webhook;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use serde::Serialize;

use crate::models::{Appointment, Owner, Reservation};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReservationNotice {
    pub to: String,
    pub reply_to: Option<String>,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait NotificationProvider: Send + Sync {
    async fn send_notice(&self, notice: &ReservationNotice) -> anyhow::Result<()>;
}

/// Used when no delivery endpoint is configured.
pub struct LogNotifier;

#[async_trait]
impl NotificationProvider for LogNotifier {
    async fn send_notice(&self, notice: &ReservationNotice) -> anyhow::Result<()> {
        tracing::info!(to = %notice.to, subject = %notice.subject, "notification (not delivered)");
        Ok(())
    }
}

/// Renders `at` in the IANA zone `timezone`, or in its own offset when the
/// zone is unknown.
pub fn format_local_time(at: &DateTime<FixedOffset>, timezone: &str) -> String {
    const FORMAT: &str = "%d. %m. %Y %H:%M";
    match timezone.parse::<Tz>() {
        Ok(tz) => at.with_timezone(&tz).format(FORMAT).to_string(),
        Err(_) => at.format(FORMAT).to_string(),
    }
}

pub fn cancel_url(app_host: &str, reservation_id: &str) -> String {
    format!("{}/cancel/{reservation_id}", app_host.trim_end_matches('/'))
}

pub fn build_reservation_notice(
    reservation: &Reservation,
    appointment: Option<&Appointment>,
    owner: Option<&Owner>,
    app_host: &str,
) -> ReservationNotice {
    let time = format_local_time(&reservation.start, &reservation.timezone);
    let mut body = format!(
        "Your reservation for {time} is registered. You can cancel it by clicking <a href=\"{}\">here</a>",
        cancel_url(app_host, &reservation.id)
    );
    if let Some(appointment) = appointment.filter(|a| !a.instructions.is_empty()) {
        body.push_str(&format!("<div>{}</div>", appointment.instructions));
    }

    ReservationNotice {
        to: reservation.email.clone(),
        reply_to: owner.map(|o| o.email.clone()),
        subject: "Reservation Created".to_string(),
        body,
    }
}
