use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::oneshot;

use crate::{
    api::PlacesAPI,
    entities::{Coordinates, Place, PlaceId},
    error::Error,
};

pub fn place(id: &str, latitude: f64, longitude: f64) -> Place {
    Place::new(id, format!("Place {}", id), Coordinates::new(latitude, longitude))
}

pub fn ids(places: &[Place]) -> Vec<&str> {
    places.iter().map(|place| place.id.as_str()).collect()
}

pub enum Reply {
    Now(Result<(), Error>),
    Later(oneshot::Receiver<Result<(), Error>>),
}

/// In-memory `PlacesAPI`. Writes are recorded; each write consumes the next queued reply,
/// succeeding when the queue is empty.
pub struct FakeAPI {
    pub available: Result<Vec<Place>, Error>,
    pub user_places: Result<Vec<Place>, Error>,
    pub fetches: AtomicUsize,
    pub writes: Mutex<Vec<Vec<PlaceId>>>,
    pub replies: Mutex<VecDeque<Reply>>,
}

impl FakeAPI {
    pub fn new(available: Vec<Place>, user_places: Vec<Place>) -> Self {
        Self {
            available: Ok(available),
            user_places: Ok(user_places),
            fetches: AtomicUsize::new(0),
            writes: Mutex::new(vec![]),
            replies: Mutex::new(VecDeque::new()),
        }
    }

    pub fn reply(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn reply_later(&self) -> oneshot::Sender<Result<(), Error>> {
        let (tx, rx) = oneshot::channel();
        self.reply(Reply::Later(rx));
        tx
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> Vec<Vec<PlaceId>> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlacesAPI for FakeAPI {
    async fn fetch_available_places(&self) -> Result<Vec<Place>, Error> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.available.clone()
    }

    async fn fetch_user_places(&self) -> Result<Vec<Place>, Error> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.user_places.clone()
    }

    async fn update_user_places(&self, places: &[Place]) -> Result<(), Error> {
        self.writes
            .lock()
            .unwrap()
            .push(places.iter().map(|place| place.id.clone()).collect());

        let reply = self.replies.lock().unwrap().pop_front();

        match reply {
            None => Ok(()),
            Some(Reply::Now(result)) => result,
            Some(Reply::Later(rx)) => rx.await.unwrap(),
        }
    }
}
