use std::sync::Arc;
use std::time::Duration;

use shared::{
    InviteRecord, MatchedPair, QueueEntry, Result, ServiceError, SessionId, StorageError,
};
use uuid::Uuid;

use crate::storage::{empty_chain, note_degraded, QueueTier};

const CODE_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq)]
pub enum JoinOutcome {
    Queued,
    Matched(MatchedPair),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrivateCode {
    pub code: String,
    pub session_id: SessionId,
}

/// FIFO waiting queue and short private codes. Each attempt runs against the
/// first queue tier that answers; when that tier fails the whole attempt is
/// retried on the next one.
pub struct Matchmaking {
    tiers: Vec<Arc<dyn QueueTier>>,
    invite_ttl: Duration,
}

impl Matchmaking {
    pub fn new(tiers: Vec<Arc<dyn QueueTier>>, invite_ttl: Duration) -> Self {
        Self { tiers, invite_ttl }
    }

    /// Enqueue `entry`, or pair it with the oldest waiting entry from a
    /// different connection. The waiting entry becomes `first` and plays X.
    pub async fn join(&self, entry: &QueueEntry) -> Result<JoinOutcome> {
        let mut last_error: Option<StorageError> = None;

        for tier in &self.tiers {
            match tier.pair_or_enqueue(entry).await {
                Ok(Some(opponent)) => {
                    let pair = MatchedPair {
                        session_id: SessionId::new(),
                        first: opponent,
                        second: entry.clone(),
                    };
                    tracing::info!(
                        session_id = %pair.session_id,
                        first = %pair.first.participant_id,
                        second = %pair.second.participant_id,
                        tier = tier.tier(),
                        "Participants matched"
                    );
                    return Ok(JoinOutcome::Matched(pair));
                }
                Ok(None) => {
                    tracing::debug!(
                        participant_id = %entry.participant_id,
                        connection_id = %entry.connection_id,
                        tier = tier.tier(),
                        "Participant queued"
                    );
                    return Ok(JoinOutcome::Queued);
                }
                Err(e) => {
                    note_degraded("queue.join", &e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| empty_chain("queue.join")).into())
    }

    /// Removes the connection's waiting entry from every tier, since an
    /// earlier join may have landed on any of them. Absent entries are fine.
    pub async fn leave(&self, entry: &QueueEntry) -> Result<()> {
        let mut removed_somewhere = false;
        let mut last_error: Option<StorageError> = None;

        for tier in &self.tiers {
            match tier.remove(entry.connection_id).await {
                Ok(()) => removed_somewhere = true,
                Err(e) => {
                    note_degraded("queue.leave", &e);
                    last_error = Some(e);
                }
            }
        }

        if removed_somewhere {
            tracing::debug!(connection_id = %entry.connection_id, "Left matchmaking queue");
            return Ok(());
        }

        Err(last_error.unwrap_or_else(|| empty_chain("queue.leave")).into())
    }

    pub async fn create_private_code(
        &self,
        session_id: Option<SessionId>,
        host: &QueueEntry,
    ) -> Result<PrivateCode> {
        let session_id = session_id.unwrap_or_default();
        let code = generate_code();
        let invite = InviteRecord {
            session_id,
            host: host.clone(),
        };

        let mut last_error: Option<StorageError> = None;
        for tier in &self.tiers {
            match tier.put_invite(&code, &invite, self.invite_ttl).await {
                Ok(()) => {
                    tracing::info!(
                        code = %code,
                        session_id = %session_id,
                        host = %host.participant_id,
                        "Private code created"
                    );
                    return Ok(PrivateCode { code, session_id });
                }
                Err(e) => {
                    note_degraded("private.create", &e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| empty_chain("private.create")).into())
    }

    /// Looks a code up without consuming it.
    pub async fn resolve_code(&self, code: &str) -> Result<SessionId> {
        let code = normalize_code(code)?;
        let invite = self.find_invite(&code, false).await?;
        Ok(invite.session_id)
    }

    /// Consumes a code on behalf of `claimant`. A host cannot claim its own
    /// code; the code stays valid for someone else in that case.
    pub async fn claim_code(&self, code: &str, claimant: &QueueEntry) -> Result<InviteRecord> {
        let code = normalize_code(code)?;

        let invite = self.find_invite(&code, false).await?;
        if invite.host.participant_id == claimant.participant_id {
            return Err(ServiceError::Validation(
                "Cannot join your own private session".to_string(),
            ));
        }

        let invite = self.find_invite(&code, true).await?;
        tracing::info!(
            code = %code,
            session_id = %invite.session_id,
            joiner = %claimant.participant_id,
            "Private code claimed"
        );
        Ok(invite)
    }

    async fn find_invite(&self, code: &str, consume: bool) -> Result<InviteRecord> {
        let operation = if consume { "private.claim" } else { "private.resolve" };

        for tier in &self.tiers {
            let attempt = if consume {
                tier.take_invite(code).await
            } else {
                tier.get_invite(code).await
            };
            match attempt {
                Ok(Some(invite)) => return Ok(invite),
                Ok(None) => {}
                Err(e) => note_degraded(operation, &e),
            }
        }

        Err(ServiceError::InvalidCode(code.to_string()))
    }
}

fn generate_code() -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(CODE_LEN)
        .collect::<String>()
        .to_uppercase()
}

fn normalize_code(code: &str) -> Result<String> {
    let code = code.trim().to_uppercase();
    if code.is_empty() {
        return Err(ServiceError::InvalidCode(code));
    }
    Ok(code)
}
