use std::{collections::HashMap, sync::Arc};

use tokio::sync::{broadcast, Mutex};

use crate::models::{
    game::{GameMode, Operation},
    score::LeaderboardEntry,
};

const CHANNEL_CAPACITY: usize = 16;

type Board = (Operation, GameMode);

/// Fans out refreshed leaderboards to everyone watching a board.
#[derive(Clone, Default)]
pub struct LeaderboardHub {
    channels: Arc<Mutex<HashMap<Board, broadcast::Sender<Vec<LeaderboardEntry>>>>>,
}

pub struct LeaderboardSubscription {
    receiver: broadcast::Receiver<Vec<LeaderboardEntry>>,
    board: Board,
    hub: LeaderboardHub,
}

impl LeaderboardHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, operation: Operation, mode: GameMode) -> LeaderboardSubscription {
        let mut channels = self.channels.lock().await;
        channels.retain(|_, sender| sender.receiver_count() > 0);
        let sender = channels
            .entry((operation, mode))
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        LeaderboardSubscription {
            receiver: sender.subscribe(),
            board: (operation, mode),
            hub: self.clone(),
        }
    }

    /// Returns how many subscribers received the update.
    pub async fn publish(
        &self,
        operation: Operation,
        mode: GameMode,
        entries: Vec<LeaderboardEntry>,
    ) -> usize {
        let mut channels = self.channels.lock().await;
        let Some(sender) = channels.get(&(operation, mode)) else {
            return 0;
        };

        match sender.send(entries) {
            Ok(count) => count,
            Err(_) => {
                // Everyone left; drop the channel until the next subscriber.
                channels.remove(&(operation, mode));
                0
            }
        }
    }

    pub async fn subscriber_count(&self, operation: Operation, mode: GameMode) -> usize {
        self.channels
            .lock()
            .await
            .get(&(operation, mode))
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

impl LeaderboardSubscription {
    /// Next leaderboard push. Skips over updates missed while lagging and
    /// returns `None` once the hub is gone.
    pub async fn next(&mut self) -> Option<Vec<LeaderboardEntry>> {
        loop {
            match self.receiver.recv().await {
                Ok(entries) => return Some(entries),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("Leaderboard subscriber lagged by {} updates", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for LeaderboardSubscription {
    fn drop(&mut self) {
        // Our receiver is still alive here, so a count of one means we were last.
        // On contention the next subscribe prunes the channel instead.
        if let Ok(mut channels) = self.hub.channels.try_lock() {
            if channels
                .get(&self.board)
                .is_some_and(|sender| sender.receiver_count() <= 1)
            {
                channels.remove(&self.board);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, score: i32) -> LeaderboardEntry {
        LeaderboardEntry {
            username: name.to_string(),
            score,
        }
    }

    #[tokio::test]
    async fn subscribers_receive_their_board_only() {
        let hub = LeaderboardHub::new();
        let mut adds = hub.subscribe(Operation::Addition, GameMode::Mini).await;
        let mut divs = hub.subscribe(Operation::Division, GameMode::Mini).await;

        let delivered = hub
            .publish(Operation::Addition, GameMode::Mini, vec![entry("ada", 10)])
            .await;
        assert_eq!(delivered, 1);
        assert_eq!(adds.next().await, Some(vec![entry("ada", 10)]));

        hub.publish(Operation::Division, GameMode::Mini, vec![entry("bob", 3)])
            .await;
        assert_eq!(divs.next().await, Some(vec![entry("bob", 3)]));
    }

    #[tokio::test]
    async fn publishing_without_watchers_is_harmless() {
        let hub = LeaderboardHub::new();
        assert_eq!(
            hub.publish(Operation::Mixed, GameMode::Level, Vec::new())
                .await,
            0
        );
    }

    #[tokio::test]
    async fn dropping_a_subscription_unsubscribes() {
        let hub = LeaderboardHub::new();
        let sub = hub.subscribe(Operation::Addition, GameMode::Level).await;
        assert_eq!(
            hub.subscriber_count(Operation::Addition, GameMode::Level)
                .await,
            1
        );
        drop(sub);
        assert_eq!(
            hub.publish(Operation::Addition, GameMode::Level, vec![entry("x", 1)])
                .await,
            0
        );
        assert_eq!(
            hub.subscriber_count(Operation::Addition, GameMode::Level)
                .await,
            0
        );
    }

    #[tokio::test]
    async fn lagging_subscriber_gets_latest_updates() {
        let hub = LeaderboardHub::new();
        let mut sub = hub.subscribe(Operation::Addition, GameMode::Mini).await;
        for i in 0..(CHANNEL_CAPACITY as i32 + 4) {
            hub.publish(Operation::Addition, GameMode::Mini, vec![entry("ada", i)])
                .await;
        }
        let first = sub.next().await.unwrap();
        assert!(first[0].score >= 4);
    }

    #[tokio::test]
    async fn last_unsubscribe_drops_the_board() {
        let hub = LeaderboardHub::new();
        let first = hub.subscribe(Operation::Addition, GameMode::Mini).await;
        let second = hub.subscribe(Operation::Addition, GameMode::Mini).await;

        drop(first);
        assert_eq!(hub.channels.lock().await.len(), 1);
        drop(second);
        assert!(hub.channels.lock().await.is_empty());
    }

    #[tokio::test]
    async fn subscribe_prunes_abandoned_boards() {
        let hub = LeaderboardHub::new();
        let abandoned = hub.subscribe(Operation::Division, GameMode::Level).await;
        {
            // Hold the lock so the drop cannot clean up after itself.
            let _guard = hub.channels.lock().await;
            drop(abandoned);
        }
        assert_eq!(hub.channels.lock().await.len(), 1);

        let _watcher = hub.subscribe(Operation::Addition, GameMode::Mini).await;
        let channels = hub.channels.lock().await;
        assert_eq!(channels.len(), 1);
        assert!(channels.contains_key(&(Operation::Addition, GameMode::Mini)));
    }
}
