use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{watch, Mutex};

use crate::error::{Error, ErrorInfo};

pub const DEFAULT_FETCH_FALLBACK: &str = "Failed to fetch data.";

#[derive(Clone, Debug, PartialEq)]
pub struct FetchState<T> {
    pub is_loading: bool,
    pub error: Option<ErrorInfo>,
    pub data: T,
}

/// The condition a view should render. Loading wins over a stale error, an error wins over
/// stale data.
#[derive(Debug, PartialEq)]
pub enum Status<'a, T> {
    Loading,
    Failed(&'a ErrorInfo),
    Ready(&'a T),
}

impl<T> FetchState<T> {
    pub fn new(data: T) -> Self {
        Self {
            is_loading: false,
            error: None,
            data,
        }
    }

    pub fn status(&self) -> Status<'_, T> {
        if self.is_loading {
            Status::Loading
        } else if let Some(error) = &self.error {
            Status::Failed(error)
        } else {
            Status::Ready(&self.data)
        }
    }
}

/// Loading/error/data state around a zero-argument async producer.
///
/// Every run is tagged with a generation number; a run that settles after a newer one was
/// started is dropped instead of overwriting the newer result.
pub struct Fetch<T, K = &'static str> {
    state: watch::Sender<FetchState<T>>,
    generation: AtomicU64,
    key: Mutex<Option<K>>,
    fallback: String,
}

impl<T, K> Fetch<T, K>
where
    T: Clone,
    K: PartialEq,
{
    pub fn new(initial: T) -> Self {
        Self::with_fallback(initial, DEFAULT_FETCH_FALLBACK)
    }

    pub fn with_fallback(initial: T, fallback: impl Into<String>) -> Self {
        let (state, _) = watch::channel(FetchState::new(initial));

        Self {
            state,
            generation: AtomicU64::new(0),
            key: Mutex::new(None),
            fallback: fallback.into(),
        }
    }

    pub fn state(&self) -> FetchState<T> {
        self.state.borrow().clone()
    }

    pub fn data(&self) -> T {
        self.state.borrow().data.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState<T>> {
        self.state.subscribe()
    }

    /// Overwrites the data slot without touching the loading or error flags.
    pub fn set_data(&self, data: T) {
        self.state.send_modify(|state| state.data = data);
    }

    /// Runs `producer` if `key` differs from the key of the previous activation (or there
    /// was none). Returns whether a run happened and its result was kept.
    pub async fn activate<F, Fut>(&self, key: K, producer: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        {
            let mut current = self.key.lock().await;

            if current.as_ref() == Some(&key) {
                return false;
            }

            *current = Some(key);
        }

        self.run(producer).await
    }

    /// Runs `producer` unconditionally. Returns `false` when the result was discarded
    /// because a newer run started in the meantime.
    pub async fn run<F, Fut>(&self, producer: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        self.state.send_modify(|state| state.is_loading = true);

        let result = producer().await;

        let applied = self.state.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }

            state.is_loading = false;

            match result {
                Ok(data) => {
                    state.data = data;
                    state.error = None;
                }
                Err(ref err) => {
                    tracing::warn!(generation, error = %err, "fetch failed");
                    state.error = Some(ErrorInfo::from_error(err, &self.fallback));
                }
            }

            true
        });

        if !applied {
            tracing::info!(generation, "discarding stale fetch result");
        }

        applied
    }
}

#[cfg(test)]
use std::sync::atomic::AtomicUsize;
#[cfg(test)]
use tokio::sync::oneshot;
#[cfg(test)]
use tokio_test::block_on;

#[cfg(test)]
use crate::error::network_error;

#[test]
fn resolves_to_empty_list() {
    let fetch: Fetch<Vec<u32>> = Fetch::new(vec![7]);

    assert!(block_on(fetch.run(|| async { Ok(vec![]) })));
    assert_eq!(
        fetch.state(),
        FetchState {
            is_loading: false,
            error: None,
            data: vec![],
        }
    );
}

#[test]
fn rejection_keeps_previous_data() {
    let fetch: Fetch<Vec<u32>> = Fetch::new(vec![1, 2]);

    block_on(fetch.run(|| async { Err(network_error("X")) }));

    let state = fetch.state();
    assert!(!state.is_loading);
    assert_eq!(state.error, Some(ErrorInfo::new("X")));
    assert_eq!(state.data, vec![1, 2]);
    assert_eq!(state.status(), Status::Failed(&ErrorInfo::new("X")));
}

#[test]
fn empty_message_uses_fallback() {
    let fetch: Fetch<u32> = Fetch::with_fallback(0, "Failed to fetch places.");

    block_on(fetch.run(|| async { Err(network_error("")) }));

    assert_eq!(
        fetch.state().error,
        Some(ErrorInfo::new("Failed to fetch places."))
    );

    let fetch: Fetch<u32> = Fetch::new(0);
    block_on(fetch.run(|| async { Err(network_error(" ")) }));
    assert_eq!(
        fetch.state().error,
        Some(ErrorInfo::new(DEFAULT_FETCH_FALLBACK))
    );
}

#[test]
fn success_clears_earlier_error() {
    let fetch: Fetch<u32> = Fetch::new(0);

    block_on(async {
        fetch.run(|| async { Err(network_error("down")) }).await;
        fetch.run(|| async { Ok(3) }).await;
    });

    assert_eq!(fetch.state().status(), Status::Ready(&3));
}

#[test]
fn loading_while_suspended() {
    let fetch: Fetch<u32> = Fetch::new(0);
    let (tx, rx) = oneshot::channel();

    block_on(async {
        let (applied, _) = tokio::join!(
            fetch.run(move || async move { rx.await.unwrap() }),
            async {
                assert_eq!(fetch.state().status(), Status::Loading);
                tx.send(Ok(5)).unwrap();
            }
        );
        assert!(applied);
    });

    assert_eq!(fetch.state().status(), Status::Ready(&5));
}

#[test]
fn stale_result_is_discarded() {
    let fetch: Fetch<&str> = Fetch::new("initial");
    let (old_tx, old_rx) = oneshot::channel();
    let (new_tx, new_rx) = oneshot::channel();

    block_on(async {
        let (old, new, _) = tokio::join!(
            fetch.run(move || async move { old_rx.await.unwrap() }),
            fetch.run(move || async move { new_rx.await.unwrap() }),
            async {
                new_tx.send(Ok("new")).unwrap();
                tokio::task::yield_now().await;
                old_tx.send(Ok("old")).unwrap();
            }
        );

        assert!(!old);
        assert!(new);
    });

    assert_eq!(fetch.state().status(), Status::Ready(&"new"));
}

#[test]
fn stale_run_does_not_end_loading() {
    let fetch: Fetch<u32> = Fetch::new(0);
    let (old_tx, old_rx) = oneshot::channel();
    let (new_tx, new_rx) = oneshot::channel();

    block_on(async {
        tokio::join!(
            fetch.run(move || async move { old_rx.await.unwrap() }),
            fetch.run(move || async move { new_rx.await.unwrap() }),
            async {
                old_tx.send(Err(network_error("late"))).unwrap();
                tokio::task::yield_now().await;
                assert_eq!(fetch.state().status(), Status::Loading);
                new_tx.send(Ok(1)).unwrap();
            }
        );
    });

    assert_eq!(fetch.state().error, None);
    assert_eq!(fetch.data(), 1);
}

#[test]
fn activate_runs_once_per_key() {
    let fetch: Fetch<usize> = Fetch::new(0);
    let calls = AtomicUsize::new(0);
    let counter = &calls;
    let producer = move || async move { Ok(counter.fetch_add(1, Ordering::SeqCst) + 1) };

    block_on(async {
        assert!(fetch.activate("places", producer).await);
        assert!(!fetch.activate("places", producer).await);
        assert!(fetch.activate("places-nearby", producer).await);
    });

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(fetch.data(), 2);
}

#[test]
fn subscribers_see_updates() {
    let fetch: Fetch<Vec<u32>> = Fetch::new(vec![]);
    let mut rx = fetch.subscribe();

    fetch.set_data(vec![4]);
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().data, vec![4]);

    block_on(fetch.run(|| async { Ok(vec![9]) }));
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow().status(), Status::Ready(&vec![9]));
}
