use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::storage::EdgeStorage;

/// One security-relevant occurrence, appended to the audit log.
///
/// Three shapes share this struct: authenticated auth events, anonymous
/// auth events (failed login on an unknown user), and invoice validations.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub user: Option<String>,
    pub action: &'static str,
    pub resource_type: &'static str,
    pub resource_id: Option<String>,
    pub ip_address: String,
    pub user_agent: String,
    pub details: Value,
}

impl AuditEvent {
    /// Auth event for a known user.
    pub fn auth(
        user: impl Into<String>,
        action: &'static str,
        client: &ClientInfo,
        details: Value,
    ) -> Self {
        AuditEvent {
            user: Some(user.into()),
            action,
            resource_type: "AUTH",
            resource_id: None,
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
            details,
        }
    }

    /// Auth event with no resolvable user (e.g. login for an unknown name).
    pub fn auth_anonymous(action: &'static str, client: &ClientInfo, details: Value) -> Self {
        AuditEvent {
            user: None,
            action,
            resource_type: "AUTH",
            resource_id: None,
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
            details,
        }
    }

    /// Invoice validation request, keyed by invoice number.
    pub fn invoice_validation(
        user: impl Into<String>,
        invoice_number: impl Into<String>,
        client: &ClientInfo,
        details: Value,
    ) -> Self {
        AuditEvent {
            user: Some(user.into()),
            action: "VALIDATE_INVOICE",
            resource_type: "INVOICE",
            resource_id: Some(invoice_number.into()),
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
            details,
        }
    }
}

/// Client identity extracted from the inbound request.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub ip_address: String,
    pub user_agent: String,
}

impl ClientInfo {
    pub fn unknown() -> Self {
        ClientInfo {
            ip_address: "unknown".to_string(),
            user_agent: "unknown".to_string(),
        }
    }
}

/// Asynchronous, bounded audit writer.
///
/// `emit` never blocks the request path: events queue onto a bounded
/// channel drained by a background task, and are dropped with a warning
/// when the queue is full.
#[derive(Clone)]
pub struct AuditLog {
    tx: mpsc::Sender<AuditEvent>,
}

impl AuditLog {
    pub fn new(storage: Arc<dyn EdgeStorage>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<AuditEvent>(capacity);

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = storage.append_audit(&event).await {
                    error!(action = event.action, error = %e, "Failed to append audit event");
                } else {
                    debug!(action = event.action, "Audit event appended");
                }
            }
        });

        AuditLog { tx }
    }

    pub fn emit(&self, event: AuditEvent) {
        if let Err(e) = self.tx.try_send(event) {
            warn!(error = %e, "Audit queue full, dropping event");
        }
    }
}
