use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::SessionError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub username: String,
    pub uuid: String,
    pub access_token: String,
    pub user_type: String,
    pub expires_at: DateTime<Utc>,
}

impl Account {
    /// Expired, or expiring before `now + grace`. A window past the end of
    /// representable time covers every account.
    pub fn expires_within(&self, grace: Duration, now: DateTime<Utc>) -> bool {
        now.checked_add_signed(grace)
            .map_or(true, |deadline| self.expires_at <= deadline)
    }

    pub fn launch_auth(&self) -> LaunchAuth {
        LaunchAuth {
            username: self.username.clone(),
            uuid: self.uuid.clone(),
            access_token: self.access_token.clone(),
            user_type: self.user_type.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchAuth {
    pub username: String,
    pub uuid: String,
    pub access_token: String,
    pub user_type: String,
}

#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn active_account(&self) -> Option<Account>;

    async fn refresh(&self, account_id: &str) -> Result<(), SessionError>;

    async fn begin_interactive_login(&self) -> Result<Account, SessionError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCheck {
    Valid(Account),
    /// The sequence stops here; an interactive login has already been started.
    LoginRequired { reason: SessionError },
}

pub async fn check_session(
    provider: &dyn SessionProvider,
    grace: Duration,
    now: DateTime<Utc>,
) -> SessionCheck {
    let reason = match provider.active_account().await {
        Some(account) if !account.expires_within(grace, now) => {
            return SessionCheck::Valid(account);
        }
        Some(account) => match provider.refresh(&account.id).await {
            Ok(()) => match provider.active_account().await {
                Some(refreshed) if !refreshed.expires_within(grace, now) => {
                    tracing::debug!(account_id = %refreshed.id, "session refreshed");
                    return SessionCheck::Valid(refreshed);
                }
                _ => SessionError::RefreshFailed("refreshed session is still expired".to_string()),
            },
            Err(error) => error,
        },
        None => SessionError::NoAccount,
    };

    tracing::info!(%reason, "session unusable, starting interactive login");
    match provider.begin_interactive_login().await {
        Ok(account) => tracing::info!(account_id = %account.id, "interactive login finished"),
        Err(error) => tracing::warn!(%error, "interactive login did not complete"),
    }
    SessionCheck::LoginRequired { reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{account, FakeSessionProvider};
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .expect("timestamp")
            .with_timezone(&Utc)
    }

    #[tokio::test]
    async fn fresh_account_is_valid_without_refresh() {
        let provider = FakeSessionProvider::with(account("steve", now() + Duration::hours(1)));
        let check = check_session(&provider, Duration::seconds(10), now()).await;
        assert!(matches!(check, SessionCheck::Valid(ref a) if a.id == "steve"));
        assert_eq!(provider.refreshes(), 0);
        assert_eq!(provider.logins(), 0);
    }

    #[test]
    fn grace_past_the_end_of_time_counts_as_expiring() {
        let steve = account("steve", now() + Duration::hours(1));
        assert!(steve.expires_within(Duration::days(365_000_000), now()));
        assert!(!steve.expires_within(Duration::seconds(10), now()));
    }

    #[tokio::test]
    async fn account_inside_grace_window_is_refreshed() {
        let provider = FakeSessionProvider::with(account("steve", now() + Duration::seconds(5)))
            .refreshing_to(now() + Duration::hours(1));
        let check = check_session(&provider, Duration::seconds(10), now()).await;
        match check {
            SessionCheck::Valid(account) => assert_eq!(account.expires_at, now() + Duration::hours(1)),
            other => panic!("unexpected check {other:?}"),
        }
        assert_eq!(provider.refreshes(), 1);
    }

    #[tokio::test]
    async fn failed_refresh_falls_back_to_login() {
        let provider = FakeSessionProvider::with(account("steve", now() - Duration::minutes(1)));
        let check = check_session(&provider, Duration::seconds(10), now()).await;
        assert_eq!(
            check,
            SessionCheck::LoginRequired {
                reason: SessionError::RefreshFailed("token revoked".into())
            }
        );
        assert_eq!(provider.logins(), 1);
    }

    #[tokio::test]
    async fn no_account_requires_login() {
        let provider = FakeSessionProvider::default();
        let check = check_session(&provider, Duration::seconds(10), now()).await;
        assert_eq!(
            check,
            SessionCheck::LoginRequired {
                reason: SessionError::NoAccount
            }
        );
        assert_eq!(provider.refreshes(), 0);
        assert_eq!(provider.logins(), 1);
    }
}
