use crate::{
    classifier::UNKNOWN_FAILURE,
    config::{DisplayConfig, SessionConfig},
    model::{ClassificationResult, Notice},
    page::{PageError, PageState, SelectionView},
    results::ResultsView,
    speech::{Narrator, SpeechCommand},
};
use parking_lot::Mutex;
use serde::Serialize;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

pub type SessionId = u64;

/// In-flight classification, tagged with the generation it belongs to.
#[derive(Debug)]
pub struct Submission {
    pub generation: u64,
    pub photo_data_uri: String,
}

/// State of one open page: the form/result state machine plus read-aloud.
#[derive(Debug)]
pub struct PageSession {
    pub page: PageState,
    pub narrator: Narrator,
    generation: u64,
    last_seen: Instant,
}

impl Default for PageSession {
    fn default() -> Self {
        Self {
            page: PageState::new(),
            narrator: Narrator::default(),
            generation: 0,
            last_seen: Instant::now(),
        }
    }
}

impl PageSession {
    /// Idle → Loading. Any previous description is gone, so playback stops.
    pub fn begin_submission(&mut self) -> Result<(Submission, Option<SpeechCommand>), PageError> {
        let photo_data_uri = self.page.begin()?;
        self.generation += 1;

        Ok((
            Submission {
                generation: self.generation,
                photo_data_uri,
            },
            self.narrator.stop(),
        ))
    }

    /// Applies the outcome unless the page moved on while it was in flight.
    pub fn finish_submission(
        &mut self,
        generation: u64,
        outcome: Result<ClassificationResult, String>,
    ) -> bool {
        if generation != self.generation || !self.page.is_loading() {
            return false;
        }
        self.page.complete(outcome).is_ok()
    }

    pub fn scan_again(&mut self) -> Option<SpeechCommand> {
        self.page.scan_again();
        // Invalidates whatever submission is still in flight.
        self.generation += 1;
        self.narrator.stop()
    }

    pub fn description(&self) -> &str {
        self.page
            .result()
            .map(|result| result.description.as_str())
            .unwrap_or_default()
    }

    pub fn view(&self, id: SessionId, display: &DisplayConfig) -> SessionView {
        SessionView {
            id: id.to_string(),
            state: self.page.name(),
            selection: self.page.selection().map(SelectionView::from),
            preview_url: self.page.preview_url().map(str::to_string),
            results: self
                .page
                .result()
                .map(|result| ResultsView::new(result, display)),
            error: self.page.error().map(str::to_string),
            speaking: self.narrator.is_speaking(),
            speech: None,
            notice: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: String,
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<SelectionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<ResultsView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub speaking: bool,
    /// Set when the client must act on its speech engine, e.g. cancel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech: Option<SpeechCommand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
}

impl SessionView {
    pub fn with_speech(mut self, speech: Option<SpeechCommand>) -> Self {
        self.speech = speech;
        self
    }

    pub fn with_notice(mut self, notice: Notice) -> Self {
        self.notice = Some(notice);
        self
    }
}

pub struct SessionStore {
    sessions: Mutex<HashMap<SessionId, PageSession>>,
    idle_ttl: Duration,
}

impl SessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_ttl: Duration::from_secs(config.idle_ttl_secs),
        }
    }

    pub fn create(&self) -> SessionId {
        let mut sessions = self.sessions.lock();

        let before = sessions.len();
        let idle_ttl = self.idle_ttl;
        sessions.retain(|_, session| session.last_seen.elapsed() < idle_ttl);
        if sessions.len() < before {
            tracing::debug!("Expired {} idle sessions", before - sessions.len());
        }

        let mut id = rand::random::<SessionId>();
        while sessions.contains_key(&id) {
            id = rand::random();
        }
        sessions.insert(id, PageSession::default());
        id
    }

    /// Runs `f` on the session under the store lock. Never hold across awaits.
    pub fn with_session<R>(
        &self,
        id: SessionId,
        f: impl FnOnce(&mut PageSession) -> R,
    ) -> Option<R> {
        let mut sessions = self.sessions.lock();
        let session = sessions.get_mut(&id)?;
        session.last_seen = Instant::now();
        Some(f(session))
    }

    pub fn remove(&self, id: SessionId) -> Option<PageSession> {
        self.sessions.lock().remove(&id)
    }
}

/// Fails the submission when dropped before `disarm`, so a request cancelled
/// mid-classification cannot leave its page in Loading.
pub struct PendingSubmission {
    store: Arc<SessionStore>,
    id: SessionId,
    generation: u64,
    armed: bool,
}

impl PendingSubmission {
    pub fn new(store: Arc<SessionStore>, id: SessionId, generation: u64) -> Self {
        Self {
            store,
            id,
            generation,
            armed: true,
        }
    }

    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingSubmission {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let generation = self.generation;
        let failed = self.store.with_session(self.id, |session| {
            session.finish_submission(generation, Err(UNKNOWN_FAILURE.to_string()))
        });
        if failed == Some(true) {
            tracing::warn!("Submission for session {} abandoned mid-flight", self.id);
        }
    }
}
