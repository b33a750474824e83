//! Authorization state machine
//!
//! Per-user states: Unregistered -> Registered(unauthorized) ->
//! Authorized -> Admin. Admin is reached only through an explicit
//! authorize-with-admin action or the bootstrap rule; deauthorize
//! returns any user, admin or not, to Registered(unauthorized).

use std::sync::Arc;
use std::time::Duration;

use crate::data::{Database, NewUser, User};
use crate::error::AppError;
use crate::metrics::{AUTHORIZATION_CHANGES_TOTAL, REGISTRATIONS_TOTAL};
use crate::telegram::ChatClient;

/// Upper bound on any single best-effort outbound notification.
/// On expiry the send is abandoned and logged, never retried.
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Read-only access decision for a user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Access {
    pub authorized: bool,
    pub is_admin: bool,
}

/// Authorization service over the persistence adapter.
pub struct AuthService {
    db: Arc<Database>,
    chat: Arc<dyn ChatClient>,
}

impl AuthService {
    pub fn new(db: Arc<Database>, chat: Arc<dyn ChatClient>) -> Self {
        Self { db, chat }
    }

    /// Register a user on first contact.
    ///
    /// Idempotent: an existing user is returned unchanged. A brand-new
    /// user is created unauthorized, unless the atomic insert-if-first
    /// wins and grants bootstrap admin. Newly registered non-admins
    /// trigger a detached admin notification whose failure never fails
    /// registration.
    ///
    /// # Returns
    /// The user row and whether it was newly created.
    pub async fn register(&self, profile: NewUser) -> Result<(User, bool), AppError> {
        let candidate = profile.clone().into_user(false, false);

        // Atomic insert-if-first decides the bootstrap admin without a
        // read-then-write race.
        if self.db.insert_user_if_first(&candidate).await? {
            let user = self
                .db
                .get_user(candidate.user_id)
                .await?
                .ok_or(AppError::NotFound)?;
            REGISTRATIONS_TOTAL.inc();
            tracing::info!(
                user_id = user.user_id,
                "First user registered and granted bootstrap admin"
            );
            return Ok((user, true));
        }

        if let Some(existing) = self.db.get_user(candidate.user_id).await? {
            return Ok((existing, false));
        }

        let inserted = self.db.insert_user(&candidate).await?;
        let user = self
            .db
            .get_user(candidate.user_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if inserted {
            REGISTRATIONS_TOTAL.inc();
            tracing::info!(
                user_id = user.user_id,
                is_authorized = user.is_authorized,
                "New user registered"
            );
            if !user.is_admin {
                self.spawn_admin_notification(user.clone());
            }
        }

        Ok((user, inserted))
    }

    /// Grant access (and optionally admin) to a target user.
    ///
    /// Permission check first, target existence second; the outbound
    /// notification to the target is best-effort and does not roll the
    /// mutation back.
    pub async fn authorize(
        &self,
        acting_id: i64,
        target_id: i64,
        grant_admin: bool,
    ) -> Result<(), AppError> {
        self.require_admin(acting_id).await?;

        let target = self
            .db
            .get_user(target_id)
            .await?
            .ok_or(AppError::NotFound)?;

        self.db.set_authorization(target_id, true, grant_admin).await?;
        AUTHORIZATION_CHANGES_TOTAL
            .with_label_values(&["authorize"])
            .inc();
        tracing::info!(
            acting_id,
            target_id,
            grant_admin,
            "User authorized"
        );

        let suffix = if grant_admin { " as an admin" } else { "" };
        self.spawn_notification(
            target.chat_id,
            format!("You have been authorized{} to use WebBridge!", suffix),
        );

        Ok(())
    }

    /// Revoke access from a target user. Clears admin status too.
    pub async fn deauthorize(&self, acting_id: i64, target_id: i64) -> Result<(), AppError> {
        self.require_admin(acting_id).await?;

        let target = self
            .db
            .get_user(target_id)
            .await?
            .ok_or(AppError::NotFound)?;

        self.db.set_authorization(target_id, false, false).await?;
        AUTHORIZATION_CHANGES_TOTAL
            .with_label_values(&["deauthorize"])
            .inc();
        tracing::info!(acting_id, target_id, "User deauthorized");

        self.spawn_notification(
            target.chat_id,
            "You have been deauthorized from using WebBridge.".to_string(),
        );

        Ok(())
    }

    /// Read-only gate consulted before any media or admin command.
    /// Unknown users are denied.
    pub async fn check_access(&self, user_id: i64) -> Result<Access, AppError> {
        Ok(self
            .db
            .get_user(user_id)
            .await?
            .map(|user| Access {
                authorized: user.is_authorized,
                is_admin: user.is_admin,
            })
            .unwrap_or_default())
    }

    /// Look up a user for admin inspection.
    pub async fn user_info(&self, acting_id: i64, target_id: i64) -> Result<User, AppError> {
        self.require_admin(acting_id).await?;
        self.db.get_user(target_id).await?.ok_or(AppError::NotFound)
    }

    /// One page of users plus the total count, for `/listusers`.
    pub async fn list_users(
        &self,
        acting_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<User>, i64), AppError> {
        self.require_admin(acting_id).await?;
        let total = self.db.count_users().await?;
        let users = self.db.list_users(offset, limit).await?;
        Ok((users, total))
    }

    /// Fail with `PermissionDenied` unless the acting user exists and
    /// is an admin. Evaluated before any target lookup.
    async fn require_admin(&self, acting_id: i64) -> Result<User, AppError> {
        match self.db.get_user(acting_id).await? {
            Some(user) if user.is_admin => Ok(user),
            _ => Err(AppError::PermissionDenied),
        }
    }

    /// Fire-and-forget fan-out to all current admins about a new user,
    /// skipping the new user themselves. Off the critical path.
    fn spawn_admin_notification(&self, new_user: User) {
        let db = self.db.clone();
        let chat = self.chat.clone();

        tokio::spawn(async move {
            let admins = match db.list_admins().await {
                Ok(admins) => admins,
                Err(error) => {
                    tracing::warn!(%error, "Failed to load admin list for new-user notification");
                    return;
                }
            };

            let text = format!(
                "A new user has joined: {} {} ({})\nID: {}\n\nUse /authorize {} to grant access.",
                new_user.first_name,
                new_user.last_name,
                new_user.display_username(),
                new_user.user_id,
                new_user.user_id,
            );

            for admin in admins {
                if admin.user_id == new_user.user_id {
                    continue;
                }
                send_bounded(chat.as_ref(), admin.chat_id, &text).await;
            }
        });
    }

    /// Detached single-recipient notification with bounded runtime.
    fn spawn_notification(&self, chat_id: i64, text: String) {
        let chat = self.chat.clone();
        tokio::spawn(async move {
            send_bounded(chat.as_ref(), chat_id, &text).await;
        });
    }
}

/// Send with a deadline; delivery failures downstream of a successful
/// mutation are logged and swallowed.
async fn send_bounded(chat: &dyn ChatClient, chat_id: i64, text: &str) {
    match tokio::time::timeout(NOTIFY_TIMEOUT, chat.send_message(chat_id, text)).await {
        Ok(Ok(())) => {}
        Ok(Err(error)) => {
            tracing::warn!(chat_id, %error, "Best-effort notification failed");
        }
        Err(_) => {
            tracing::warn!(chat_id, "Best-effort notification timed out; abandoned");
        }
    }
}
