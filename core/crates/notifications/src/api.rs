use lms_core_sync::WsError;
use lms_store::SiteId;

/// Remote operations on the notifications read state
#[async_trait::async_trait]
pub trait NotificationsApi: Send + Sync + 'static {
	/// `time_read` in seconds
	async fn mark_notification_read(
		&self,
		site_id: &SiteId,
		notification_id: u64,
		time_read: i64,
	) -> Result<(), WsError>;

	async fn mark_all_notifications_as_read(&self, site_id: &SiteId, user_id: u64) -> Result<(), WsError>;

	/// Drops the cached notifications list so the next read fetches the new read state
	async fn invalidate_notifications_list(&self, site_id: &SiteId) -> Result<(), WsError>;
}
