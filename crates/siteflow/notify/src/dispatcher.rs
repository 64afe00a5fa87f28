//! The dispatcher: drains the outbox into the mailer
//!
//! Draining never fails a committed transition. A send failure
//! reschedules the entry with exponential backoff; after
//! `max_attempts` the entry parks as dead and is only visible to
//! operators.

use crate::{DeliveryStatus, EmailMessage, Mailer, NotifyResult, Outbox, UserDirectory};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use siteflow_store::EntityStore;
use siteflow_types::{ActorId, EngineEvent};

/// Retry policy for notification delivery
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Attempts before an entry parks as dead
    pub max_attempts: u32,
    /// Backoff after the first failure, doubling per attempt
    pub initial_backoff_secs: u64,
    /// Backoff ceiling
    pub max_backoff_secs: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_secs: 30,
            max_backoff_secs: 3600,
        }
    }
}

impl DispatcherConfig {
    /// Delay before the next attempt, given the attempts already made
    pub fn backoff(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(31);
        let secs = self
            .initial_backoff_secs
            .saturating_mul(1u64 << exponent)
            .min(self.max_backoff_secs);
        Duration::seconds(secs as i64)
    }
}

/// Outcome of one drain pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub sent: usize,
    pub retried: usize,
    pub dead: usize,
    /// Entries with nothing to deliver (internal events, no known
    /// recipients)
    pub skipped: usize,
}

/// Drains outbox entries into the mailer with retry/backoff
pub struct Dispatcher<S, D, M> {
    outbox: Outbox<S>,
    directory: D,
    mailer: M,
    config: DispatcherConfig,
}

impl<S, D, M> Dispatcher<S, D, M>
where
    S: EntityStore,
    D: UserDirectory,
    M: Mailer,
{
    pub fn new(outbox: Outbox<S>, directory: D, mailer: M, config: DispatcherConfig) -> Self {
        Self {
            outbox,
            directory,
            mailer,
            config,
        }
    }

    /// Process every due entry once
    pub async fn drain(&self, now: DateTime<Utc>) -> NotifyResult<DrainReport> {
        let mut report = DrainReport::default();

        for (path, mut entry) in self.outbox.entries().await? {
            if !entry.due(now) {
                continue;
            }

            let Some(message) = self.render(&entry.event).await else {
                // Internal side effects and empty fan-outs retire
                // without a send
                entry.status = DeliveryStatus::Sent { at: now };
                self.outbox.save(&path, &entry).await?;
                report.skipped += 1;
                continue;
            };

            entry.attempts += 1;
            match self.mailer.send(&message).await {
                Ok(()) => {
                    entry.status = DeliveryStatus::Sent { at: now };
                    report.sent += 1;
                }
                Err(error) if entry.attempts >= self.config.max_attempts => {
                    entry.status = DeliveryStatus::Dead;
                    report.dead += 1;
                    tracing::warn!(
                        path = %path,
                        attempts = entry.attempts,
                        %error,
                        "notification parked as dead"
                    );
                }
                Err(error) => {
                    entry.next_attempt_at = now + self.config.backoff(entry.attempts);
                    report.retried += 1;
                    tracing::warn!(
                        path = %path,
                        attempts = entry.attempts,
                        next_attempt_at = %entry.next_attempt_at,
                        %error,
                        "notification send failed, rescheduled"
                    );
                }
            }
            self.outbox.save(&path, &entry).await?;
        }

        Ok(report)
    }

    /// Render an event into a message, resolving recipient addresses.
    /// None when there is nothing to deliver.
    async fn render(&self, event: &EngineEvent) -> Option<EmailMessage> {
        let recipients = event.recipients();
        if recipients.is_empty() {
            return None;
        }

        let mut message = match event {
            EngineEvent::StatusChanged {
                entity_id,
                entity_label,
                from,
                to,
                actor,
                ..
            } => EmailMessage::new(
                format!("{}: {} → {}", entity_label, from, to),
                format!(
                    "<p>The {} you are involved in moved from <b>{}</b> to <b>{}</b>.</p>",
                    entity_label.to_lowercase(),
                    from,
                    to
                ),
            )
            .with_entity(entity_id.clone())
            .with_involved_user(actor.clone()),

            EngineEvent::CommentAdded {
                entity_id, author, ..
            } => {
                let author_name = self.display_name(author).await;
                EmailMessage::new(
                    format!("New comment from {}", author_name),
                    format!("<p><b>{}</b> commented on an item you follow.</p>", author_name),
                )
                .with_entity(entity_id.clone())
                .with_involved_user(author.clone())
            }

            EngineEvent::Reopened {
                original,
                successor,
                actor,
                ..
            } => EmailMessage::new(
                "Item reopened",
                format!(
                    "<p>A closed item was reopened as a fresh entry ({} → {}).</p>",
                    original.short(),
                    successor.short()
                ),
            )
            .with_entity(successor.clone())
            .with_involved_user(actor.clone()),

            EngineEvent::StockDecremented { .. } | EngineEvent::HistoryAppended { .. } => {
                return None
            }
        };

        for recipient in recipients {
            match self.directory.lookup(recipient).await {
                Some(entry) => message.to.push(entry.email),
                None => {
                    tracing::warn!(actor = %recipient, "recipient not in directory, skipping")
                }
            }
        }
        if message.to.is_empty() {
            return None;
        }
        Some(message)
    }

    async fn display_name(&self, actor: &ActorId) -> String {
        match self.directory.lookup(actor).await {
            Some(entry) => entry.display_name,
            None => actor.to_string(),
        }
    }

    pub fn outbox(&self) -> &Outbox<S> {
        &self.outbox
    }
}
