use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use dealdesk::config::AuthConfig;
use dealdesk::workflows::common::Principal;
use dealdesk::workflows::ports::{AuthError, IdentityProvider, Notice, Notifier, NotifyError};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Delivers notices to the log stream, where the mail relay picks them up.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn send(&self, notice: Notice) -> Result<(), NotifyError> {
        info!(
            template = %notice.template,
            recipient = %notice.recipient,
            subject = %notice.subject_id,
            details = ?notice.details,
            "notification"
        );
        Ok(())
    }
}

/// Bearer tokens from configuration. The cron secret authenticates as the scheduler.
#[derive(Debug, Default)]
pub(crate) struct StaticTokenIdentity {
    tokens: HashMap<String, Principal>,
    cron_secret: Option<String>,
}

impl StaticTokenIdentity {
    pub(crate) fn from_config(config: &AuthConfig) -> Self {
        Self {
            tokens: config
                .api_tokens
                .iter()
                .map(|entry| {
                    (
                        entry.token.clone(),
                        Principal::new(entry.principal_id.clone(), entry.role),
                    )
                })
                .collect(),
            cron_secret: config.cron_secret.clone(),
        }
    }
}

impl IdentityProvider for StaticTokenIdentity {
    fn authenticate(&self, token: &str) -> Result<Principal, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        if self.cron_secret.as_deref() == Some(token) {
            return Ok(Principal::system());
        }
        self.tokens
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealdesk::config::ApiToken;
    use dealdesk::workflows::common::Role;

    fn identity() -> StaticTokenIdentity {
        StaticTokenIdentity::from_config(&AuthConfig {
            cron_secret: Some("cron-s3cret".to_string()),
            api_tokens: vec![ApiToken {
                token: "tok-ops".to_string(),
                principal_id: "ops-1".to_string(),
                role: Role::Ops,
            }],
        })
    }

    #[test]
    fn configured_tokens_resolve_to_their_principal() {
        let principal = identity().authenticate("tok-ops").expect("known token");
        assert_eq!(principal, Principal::new("ops-1", Role::Ops));
    }

    #[test]
    fn cron_secret_authenticates_as_the_scheduler() {
        let principal = identity().authenticate("cron-s3cret").expect("cron secret");
        assert_eq!(principal, Principal::system());
    }

    #[test]
    fn unknown_and_blank_tokens_are_refused() {
        assert!(matches!(
            identity().authenticate("guess"),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            identity().authenticate("  "),
            Err(AuthError::MissingToken)
        ));
    }

    #[test]
    fn notices_are_always_accepted() {
        let notice = Notice::new("kyc_expiring", "sc-1", "sc-1").with("days_left", 30);
        assert!(TracingNotifier.send(notice).is_ok());
    }
}
