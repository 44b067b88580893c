use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{watch, Mutex};

use crate::{
    api::DynAPI,
    engine::fetch::{Fetch, FetchState},
    entities::Place,
    error::ErrorInfo,
};

pub const LOAD_FALLBACK: &str = "Failed to fetch user places.";
pub const ADD_FALLBACK: &str = "Failed to update places.";
pub const REMOVE_FALLBACK: &str = "Failed to delete place.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to do; no remote write was issued.
    Unchanged,
    /// The remote write succeeded and the optimistic state stands.
    Confirmed,
    /// The remote write failed; the list was restored and the error slot set.
    RolledBack,
}

/// An open removal confirmation. Only `remove_place` and `cancel_remove` consume it, so the
/// place being removed is always the one the prompt was opened for.
#[derive(Debug)]
pub struct RemovalPrompt {
    sequence: u64,
    place: Place,
}

impl RemovalPrompt {
    pub fn place(&self) -> &Place {
        &self.place
    }
}

/// What the removal prompt slot shows while a prompt is open.
#[derive(Clone, Debug, PartialEq)]
pub struct OpenPrompt {
    pub sequence: u64,
    pub place: Place,
}

/// The user's saved list, newest first.
///
/// Mutations are applied locally before the backend confirms them and undone if it
/// refuses. They run one at a time, so the snapshot a mutation restores is exactly the state
/// it started from and a failure never undoes someone else's change.
pub struct SavedPlaces {
    api: DynAPI,
    places: Fetch<Vec<Place>>,
    update_error: watch::Sender<Option<ErrorInfo>>,
    prompt: watch::Sender<Option<OpenPrompt>>,
    prompts: AtomicU64,
    mutations: Mutex<()>,
}

impl SavedPlaces {
    pub fn new(api: DynAPI) -> Self {
        let (update_error, _) = watch::channel(None);
        let (prompt, _) = watch::channel(None);

        Self {
            api,
            places: Fetch::with_fallback(vec![], LOAD_FALLBACK),
            update_error,
            prompt,
            prompts: AtomicU64::new(0),
            mutations: Mutex::new(()),
        }
    }

    /// Fetches the saved list. Only the first call hits the backend.
    #[tracing::instrument(name = "SavedPlaces::load", skip(self))]
    pub async fn load(&self) -> bool {
        self.places
            .activate("user-places", || self.api.fetch_user_places())
            .await
    }

    pub fn places(&self) -> Vec<Place> {
        self.places.data()
    }

    pub fn state(&self) -> FetchState<Vec<Place>> {
        self.places.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState<Vec<Place>>> {
        self.places.subscribe()
    }

    pub fn update_error(&self) -> Option<ErrorInfo> {
        self.update_error.borrow().clone()
    }

    pub fn subscribe_errors(&self) -> watch::Receiver<Option<ErrorInfo>> {
        self.update_error.subscribe()
    }

    pub fn dismiss_error(&self) {
        self.update_error.send_replace(None);
    }

    /// Adds `place` at the front of the list unless a place with the same id is saved.
    #[tracing::instrument(name = "SavedPlaces::select_place", skip(self, place), fields(id = %place.id))]
    pub async fn select_place(&self, place: Place) -> Outcome {
        if place.id.trim().is_empty() {
            tracing::warn!("ignoring place without id");
            return Outcome::Unchanged;
        }

        let _guard = self.mutations.lock().await;

        let snapshot = self.places.data();

        if snapshot.iter().any(|saved| saved.id == place.id) {
            return Outcome::Unchanged;
        }

        let mut updated = Vec::with_capacity(snapshot.len() + 1);
        updated.push(place);
        updated.extend(snapshot.iter().cloned());

        self.commit(updated, snapshot, ADD_FALLBACK).await
    }

    /// Opens the removal prompt for `place`.
    pub fn start_remove(&self, place: Place) -> RemovalPrompt {
        let sequence = self.prompts.fetch_add(1, Ordering::SeqCst) + 1;

        self.prompt.send_replace(Some(OpenPrompt {
            sequence,
            place: place.clone(),
        }));

        RemovalPrompt { sequence, place }
    }

    /// The place the open removal prompt targets, if any.
    pub fn removal_prompt(&self) -> Option<Place> {
        self.prompt.borrow().as_ref().map(|open| open.place.clone())
    }

    pub fn subscribe_prompt(&self) -> watch::Receiver<Option<OpenPrompt>> {
        self.prompt.subscribe()
    }

    pub fn cancel_remove(&self, prompt: RemovalPrompt) {
        self.close_prompt(&prompt);
    }

    /// Removes the prompt's place. The prompt is closed whatever the backend says.
    #[tracing::instrument(name = "SavedPlaces::remove_place", skip(self), fields(id = %prompt.place.id))]
    pub async fn remove_place(&self, prompt: RemovalPrompt) -> Outcome {
        let outcome = {
            let _guard = self.mutations.lock().await;

            let snapshot = self.places.data();
            let updated: Vec<Place> = snapshot
                .iter()
                .filter(|saved| saved.id != prompt.place.id)
                .cloned()
                .collect();

            self.commit(updated, snapshot, REMOVE_FALLBACK).await
        };

        self.close_prompt(&prompt);

        outcome
    }

    // Must be called with the mutation lock held.
    async fn commit(&self, updated: Vec<Place>, snapshot: Vec<Place>, fallback: &str) -> Outcome {
        self.places.set_data(updated.clone());

        match self.api.update_user_places(&updated).await {
            Ok(()) => Outcome::Confirmed,
            Err(err) => {
                tracing::warn!(error = %err, "update rejected, rolling back");

                self.places.set_data(snapshot);
                self.update_error
                    .send_replace(Some(ErrorInfo::from_error(&err, fallback)));

                Outcome::RolledBack
            }
        }
    }

    // A newer prompt, even for the same place, may have replaced this one; leave it open.
    fn close_prompt(&self, prompt: &RemovalPrompt) {
        self.prompt.send_if_modified(|open| match open {
            Some(current) if current.sequence == prompt.sequence => {
                *open = None;
                true
            }
            _ => false,
        });
    }
}

#[cfg(test)]
use std::sync::Arc;
#[cfg(test)]
use tokio_test::block_on;

#[cfg(test)]
use crate::engine::fetch::Status;
#[cfg(test)]
use crate::engine::testing::{ids, place, FakeAPI, Reply};
#[cfg(test)]
use crate::error::{network_error, server_error};

#[cfg(test)]
fn saved(user_places: Vec<Place>) -> (Arc<FakeAPI>, SavedPlaces) {
    let api = Arc::new(FakeAPI::new(vec![], user_places));
    let saved = SavedPlaces::new(api.clone());

    assert!(block_on(saved.load()));

    (api, saved)
}

#[test]
fn load_fetches_once() {
    let (_, saved) = saved(vec![place("p1", 0.0, 0.0)]);

    assert_eq!(ids(&saved.places()), ["p1"]);
    assert!(!block_on(saved.load()));
    assert_eq!(saved.state().status(), Status::Ready(&saved.places()));
}

#[test]
fn load_failure_surfaces_fallback() {
    let mut api = FakeAPI::new(vec![], vec![]);
    api.user_places = Err(network_error(""));
    let saved = SavedPlaces::new(Arc::new(api));

    block_on(saved.load());

    assert_eq!(
        saved.state().error,
        Some(ErrorInfo::new("Failed to fetch user places."))
    );
    assert!(saved.places().is_empty());
}

#[test]
fn adding_a_saved_place_is_a_no_op() {
    let (api, saved) = saved(vec![place("p1", 0.0, 0.0)]);

    let outcome = block_on(saved.select_place(place("p1", 0.0, 0.0)));

    assert_eq!(outcome, Outcome::Unchanged);
    assert_eq!(ids(&saved.places()), ["p1"]);
    assert!(api.writes().is_empty());
}

#[test]
fn place_without_id_is_ignored() {
    let (api, saved) = saved(vec![]);

    assert_eq!(
        block_on(saved.select_place(place(" ", 1.0, 1.0))),
        Outcome::Unchanged
    );
    assert!(saved.places().is_empty());
    assert!(api.writes().is_empty());
}

#[test]
fn add_is_optimistic_and_rolls_back() {
    let (api, saved) = saved(vec![place("p1", 0.0, 0.0)]);
    let reply = api.reply_later();

    block_on(async {
        let (outcome, _) = tokio::join!(saved.select_place(place("p2", 1.0, 1.0)), async {
            assert_eq!(ids(&saved.places()), ["p2", "p1"]);
            reply.send(Err(server_error(500, "disk full"))).unwrap();
        });

        assert_eq!(outcome, Outcome::RolledBack);
    });

    assert_eq!(ids(&saved.places()), ["p1"]);
    assert_eq!(saved.update_error(), Some(ErrorInfo::new("disk full")));
    assert_eq!(api.writes(), [vec!["p2", "p1"]]);
}

#[test]
fn add_confirmed() {
    let (api, saved) = saved(vec![place("p1", 0.0, 0.0)]);

    let outcome = block_on(saved.select_place(place("p2", 1.0, 1.0)));

    assert_eq!(outcome, Outcome::Confirmed);
    assert_eq!(ids(&saved.places()), ["p2", "p1"]);
    assert_eq!(saved.update_error(), None);
    assert_eq!(api.writes(), [vec!["p2", "p1"]]);
}

#[test]
fn add_failure_without_message_uses_fallback() {
    let (api, saved) = saved(vec![]);
    api.reply(Reply::Now(Err(network_error(""))));

    block_on(saved.select_place(place("p1", 0.0, 0.0)));

    assert_eq!(
        saved.update_error(),
        Some(ErrorInfo::new("Failed to update places."))
    );

    saved.dismiss_error();
    assert_eq!(saved.update_error(), None);
}

#[test]
fn remove_confirmed_closes_prompt() {
    let (api, saved) = saved(vec![place("p1", 0.0, 0.0), place("p2", 1.0, 1.0)]);

    let prompt = saved.start_remove(place("p1", 0.0, 0.0));
    assert_eq!(saved.removal_prompt().map(|p| p.id), Some("p1".to_string()));

    let outcome = block_on(saved.remove_place(prompt));

    assert_eq!(outcome, Outcome::Confirmed);
    assert_eq!(ids(&saved.places()), ["p2"]);
    assert_eq!(saved.removal_prompt(), None);
    assert_eq!(api.writes(), [vec!["p2"]]);
}

#[test]
fn remove_rolls_back_and_still_closes_prompt() {
    let (api, saved) = saved(vec![place("p1", 0.0, 0.0), place("p2", 1.0, 1.0)]);
    let reply = api.reply_later();
    let prompt = saved.start_remove(place("p1", 0.0, 0.0));

    block_on(async {
        let (outcome, _) = tokio::join!(saved.remove_place(prompt), async {
            assert_eq!(ids(&saved.places()), ["p2"]);
            reply.send(Err(network_error(""))).unwrap();
        });

        assert_eq!(outcome, Outcome::RolledBack);
    });

    assert_eq!(ids(&saved.places()), ["p1", "p2"]);
    assert_eq!(
        saved.update_error(),
        Some(ErrorInfo::new("Failed to delete place."))
    );
    assert_eq!(saved.removal_prompt(), None);
}

#[test]
fn stale_prompt_leaves_newer_prompt_open() {
    let (_, saved) = saved(vec![place("p1", 0.0, 0.0), place("p2", 1.0, 1.0)]);

    let first = saved.start_remove(place("p1", 0.0, 0.0));
    let second = saved.start_remove(place("p2", 1.0, 1.0));

    saved.cancel_remove(first);
    assert_eq!(saved.removal_prompt().map(|p| p.id), Some("p2".to_string()));

    assert_eq!(second.place().id, "p2");
    saved.cancel_remove(second);
    assert_eq!(saved.removal_prompt(), None);
    assert_eq!(ids(&saved.places()), ["p1", "p2"]);
}

#[test]
fn stale_prompt_for_the_same_place_leaves_newer_prompt_open() {
    let (_, saved) = saved(vec![place("p1", 0.0, 0.0)]);
    let mut prompts = saved.subscribe_prompt();

    let stale = saved.start_remove(place("p1", 0.0, 0.0));
    let fresh = saved.start_remove(place("p1", 0.0, 0.0));

    saved.cancel_remove(stale);
    assert_eq!(saved.removal_prompt().map(|p| p.id), Some("p1".to_string()));
    assert_eq!(
        prompts.borrow_and_update().as_ref().map(|open| open.sequence),
        Some(2)
    );

    assert_eq!(block_on(saved.remove_place(fresh)), Outcome::Confirmed);
    assert_eq!(saved.removal_prompt(), None);
    assert!(saved.places().is_empty());
}

#[test]
fn add_after_failed_load_starts_from_empty_list() {
    let mut api = FakeAPI::new(vec![], vec![place("p1", 0.0, 0.0)]);
    api.user_places = Err(network_error("down"));
    let api = Arc::new(api);
    let saved = SavedPlaces::new(api.clone());

    block_on(saved.load());

    let outcome = block_on(saved.select_place(place("p9", 9.0, 9.0)));

    assert_eq!(outcome, Outcome::Confirmed);
    assert_eq!(ids(&saved.places()), ["p9"]);
    assert_eq!(api.writes(), [vec!["p9"]]);
    assert_eq!(
        saved.state().status(),
        Status::Failed(&ErrorInfo::new("down"))
    );
}

#[test]
fn failed_mutation_only_undoes_itself() {
    let (api, saved) = saved(vec![place("p1", 0.0, 0.0)]);
    let first = api.reply_later();

    block_on(async {
        let (a, b, _) = tokio::join!(
            saved.select_place(place("p2", 1.0, 1.0)),
            saved.select_place(place("p3", 2.0, 2.0)),
            async {
                assert_eq!(ids(&saved.places()), ["p2", "p1"]);
                first.send(Err(network_error("offline"))).unwrap();
            }
        );

        assert_eq!(a, Outcome::RolledBack);
        assert_eq!(b, Outcome::Confirmed);
    });

    assert_eq!(ids(&saved.places()), ["p3", "p1"]);
    assert_eq!(api.writes(), [vec!["p2", "p1"], vec!["p3", "p1"]]);
    assert_eq!(saved.update_error(), Some(ErrorInfo::new("offline")));
}

#[test]
fn error_subscribers_are_notified() {
    let (api, saved) = saved(vec![]);
    let mut errors = saved.subscribe_errors();
    api.reply(Reply::Now(Err(network_error("nope"))));

    block_on(saved.select_place(place("p1", 0.0, 0.0)));

    assert!(errors.has_changed().unwrap());
    assert_eq!(*errors.borrow_and_update(), Some(ErrorInfo::new("nope")));
}
