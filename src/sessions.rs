//! Per-user conversation state that lives only as long as the process.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use tokio::{
    sync::{Mutex, OwnedMutexGuard},
    task::JoinHandle,
};

use crate::models::wizard::Session;

#[derive(Debug)]
struct Entry<T> {
    value: T,
    touched: Instant,
}

impl<T> Entry<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            touched: Instant::now(),
        }
    }

    fn is_expired(&self, idle_timeout: Duration) -> bool {
        self.touched.elapsed() >= idle_timeout
    }
}

/// Active wizards and pending join intents, keyed by user id.
///
/// Entries that saw no write for `idle_timeout` are treated as absent and are
/// dropped by [`SessionStore::purge_expired`].
#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<i64, Entry<Session>>,
    pending_joins: DashMap<i64, Entry<i64>>,
    claims: DashMap<i64, Arc<Mutex<()>>>,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            pending_joins: DashMap::new(),
            claims: DashMap::new(),
            idle_timeout,
        }
    }

    pub fn get(&self, user_id: i64) -> Option<Session> {
        let expired = match self.sessions.get(&user_id) {
            Some(entry) if !entry.is_expired(self.idle_timeout) => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.sessions
                .remove_if(&user_id, |_, e| e.is_expired(self.idle_timeout));
        }
        None
    }

    /// Exclusive right to read, store and advance the user's current step. Held
    /// across the database write so two answers to one step cannot both be stored.
    pub async fn claim(&self, user_id: i64) -> OwnedMutexGuard<()> {
        let lock = self.claims.entry(user_id).or_default().clone();
        lock.lock_owned().await
    }

    /// Starts a conversation, replacing whatever the user was doing.
    pub fn start(&self, user_id: i64, session: Session) {
        self.sessions.insert(user_id, Entry::new(session));
    }

    pub fn end(&self, user_id: i64) -> Option<Session> {
        self.sessions
            .remove(&user_id)
            .filter(|(_, e)| !e.is_expired(self.idle_timeout))
            .map(|(_, e)| e.value)
    }

    /// Moves the user from `from` to `to` (or ends the session when `to` is `None`)
    /// only if `from` is still the current state. Returns whether the move happened.
    pub fn transition(&self, user_id: i64, from: &Session, to: Option<Session>) -> bool {
        match to {
            Some(next) => match self.sessions.get_mut(&user_id) {
                Some(mut entry)
                    if !entry.is_expired(self.idle_timeout) && entry.value == *from =>
                {
                    entry.value = next;
                    entry.touched = Instant::now();
                    true
                }
                _ => false,
            },
            None => self
                .sessions
                .remove_if(&user_id, |_, e| {
                    !e.is_expired(self.idle_timeout) && e.value == *from
                })
                .is_some(),
        }
    }

    /// Runs `f` against the live session and refreshes its idle clock.
    pub fn update<F, R>(&self, user_id: i64, f: F) -> Option<R>
    where
        F: FnOnce(&mut Session) -> R,
    {
        let mut entry = self.sessions.get_mut(&user_id)?;
        if entry.is_expired(self.idle_timeout) {
            return None;
        }
        entry.touched = Instant::now();
        Some(f(&mut entry.value))
    }

    /// Remembers the game a user wanted to join. A newer intent overwrites the older one.
    pub fn set_pending_join(&self, user_id: i64, game_id: i64) {
        self.pending_joins.insert(user_id, Entry::new(game_id));
    }

    pub fn pending_join(&self, user_id: i64) -> Option<i64> {
        self.pending_joins
            .get(&user_id)
            .filter(|e| !e.is_expired(self.idle_timeout))
            .map(|e| e.value)
    }

    pub fn take_pending_join(&self, user_id: i64) -> Option<i64> {
        self.pending_joins
            .remove(&user_id)
            .filter(|(_, e)| !e.is_expired(self.idle_timeout))
            .map(|(_, e)| e.value)
    }

    pub fn clear_pending_join(&self, user_id: i64) {
        self.pending_joins.remove(&user_id);
    }

    /// Drops every idle entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut purged = 0;
        self.sessions.retain(|_, e| {
            let expired = e.is_expired(self.idle_timeout);
            purged += usize::from(expired);
            !expired
        });
        self.pending_joins.retain(|_, e| {
            let expired = e.is_expired(self.idle_timeout);
            purged += usize::from(expired);
            !expired
        });
        // Claims nobody holds or waits for are recreated on demand.
        self.claims.retain(|_, lock| Arc::strong_count(lock) > 1);
        purged
    }

    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let purged = self.purge_expired();
                if purged > 0 {
                    tracing::debug!("purged {} idle session entries", purged);
                }
            }
        })
    }
}
