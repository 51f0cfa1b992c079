// Notification emission and reads. Writes are best-effort: a failed insert
// is logged and never fails the flow that triggered it.

use tracing::warn;
use uuid::Uuid;

use cinesorte_common::{
    Comment, Notification, NotificationKind, NotificationSender, Result, Review, Trophy,
    UserProfile,
};

use crate::Cinesorte;

pub const NOTIFICATION_PAGE: usize = 20;

const ANONYMOUS: &str = "Alguém";
const COMMENT_PREVIEW_CHARS: usize = 30;

pub fn level_up(recipient: &str, level: i32, title: &str) -> Notification {
    Notification::new(
        recipient,
        NotificationKind::LevelUp,
        "Novo Nível!",
        format!("Você alcançou o nível {level} - {title}!"),
        "TrendingUp",
    )
}

pub fn review_liked(review: &Review, actor: Option<&UserProfile>) -> Notification {
    let name = actor.map(|u| u.name.as_str()).unwrap_or(ANONYMOUS);
    let n = Notification::new(
        &review.user_id,
        NotificationKind::NewContent,
        "Nova Curtida",
        format!("{name} curtiu sua review de {}.", review.media_title),
        "Heart",
    )
    .with_media(&review.media_id, review.media_type);
    match actor {
        Some(u) => n.with_sender(NotificationSender::from_user(u)),
        None => n,
    }
}

pub fn review_commented(review: &Review, comment: &Comment, actor: Option<&UserProfile>) -> Notification {
    let preview: String = comment.text.chars().take(COMMENT_PREVIEW_CHARS).collect();
    let ellipsis = if comment.text.chars().count() > COMMENT_PREVIEW_CHARS {
        "..."
    } else {
        ""
    };
    let n = Notification::new(
        &review.user_id,
        NotificationKind::NewContent,
        "Novo Comentário",
        format!("{} comentou na sua review: \"{preview}{ellipsis}\"", comment.username),
        "MessageCircle",
    )
    .with_media(&review.media_id, review.media_type);
    match actor {
        Some(u) => n.with_sender(NotificationSender::from_user(u)),
        None => n,
    }
}

pub fn new_follower(target: &str, follower: &UserProfile) -> Notification {
    Notification::new(
        target,
        NotificationKind::NewFollower,
        "Novo Seguidor",
        format!("{} começou a seguir você.", follower.name),
        "UserPlus",
    )
    .with_sender(NotificationSender::from_user(follower))
}

pub fn trophy_unlocked(recipient: &str, trophy: &Trophy) -> Notification {
    Notification::new(
        recipient,
        NotificationKind::TrophyUnlocked,
        "Troféu Desbloqueado!",
        format!("Você conquistou o troféu \"{}\"!", trophy.title),
        trophy.icon.clone(),
    )
}

impl Cinesorte {
    pub(crate) async fn notify(&self, notification: Notification) {
        if let Err(e) = self.store.insert_notification(&notification).await {
            warn!(
                error = %e,
                recipient = %notification.recipient_id,
                kind = notification.kind.as_str(),
                "Failed to write notification"
            );
        }
    }

    /// Latest notifications for the recipient, newest first.
    pub async fn notifications(&self, uid: &str) -> Result<Vec<Notification>> {
        self.store.list_notifications(uid, NOTIFICATION_PAGE).await
    }

    pub async fn unread_count(&self, uid: &str) -> Result<i64> {
        self.store.count_unread(uid).await
    }

    /// Marks the notification read when `uid` owns it. Anything else is a silent no-op.
    pub async fn mark_read(&self, uid: &str, id: Uuid) -> Result<()> {
        if !self.store.mark_notification_read(id, uid).await? {
            tracing::debug!(uid, %id, "mark_read matched nothing");
        }
        Ok(())
    }
}
