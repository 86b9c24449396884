use podium_booking::NotificationDispatcher;
use podium_core::notify::Notification;
use tokio::sync::mpsc;
use tracing::info;

/// Drains the notification queue until every sender is dropped.
pub async fn start_notification_worker(
    mut rx: mpsc::Receiver<Notification>,
    dispatcher: NotificationDispatcher,
) {
    info!("Notification worker started");

    while let Some(notification) = rx.recv().await {
        dispatcher.dispatch(notification).await;
    }

    info!("Notification queue closed, worker exiting");
}
