use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;
use crate::config::Timings;
use crate::error::GatewayError;
use crate::helpers::debounce::DistinctDebouncer;
use crate::helpers::notifier::Notifier;
use crate::models::place::{Coordinates, PlaceDetails, Prediction};
use crate::repositories::gateway::BackendGateway;

pub const MIN_QUERY_CHARS: usize = 3;
pub const PLACE_DETAILS_FAILED: &str = "Could not get details for the selected place. Please try again.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AutocompleteEvent {
    /// The whole field content after a keystroke.
    Input(String),
    Key(NavigationKey),
    /// Pointer click on a dropdown row.
    Select(usize),
    Focus,
    Blur,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavigationKey {
    ArrowDown,
    ArrowUp,
    Enter,
    Escape,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AutocompletePhase {
    Idle,
    Debouncing,
    Fetching,
    Showing,
    Navigating,
    Resolving,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AutocompleteView {
    pub text: String,
    pub predictions: Vec<Prediction>,
    pub dropdown_visible: bool,
    pub active_index: Option<usize>,
    pub phase: AutocompletePhase,
}

impl Default for AutocompleteView {
    fn default() -> Self {
        Self {
            text: String::new(),
            predictions: Vec::new(),
            dropdown_visible: false,
            active_index: None,
            phase: AutocompletePhase::Idle,
        }
    }
}

/// A prediction resolved to coordinates; the page turns it into a search.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedLocation {
    pub address: String,
    pub coordinates: Coordinates,
}

struct FetchOutcome {
    sequence: u64,
    query: String,
    result: Result<Vec<Prediction>, GatewayError>,
}

struct PlaceOutcome {
    prediction: Prediction,
    result: Result<PlaceDetails, GatewayError>,
}

enum Outcome {
    Fetch(FetchOutcome),
    Place(PlaceOutcome),
}

/// Input side of a running controller.
#[derive(Clone)]
pub struct AutocompleteHandle {
    events: mpsc::UnboundedSender<AutocompleteEvent>,
    view: watch::Receiver<AutocompleteView>,
}

impl AutocompleteHandle {
    /// Returns false once the controller has stopped.
    pub fn send(&self, event: AutocompleteEvent) -> bool {
        self.events.send(event).is_ok()
    }

    pub fn view(&self) -> AutocompleteView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AutocompleteView> {
        self.view.clone()
    }
}

pub struct AutocompleteController {
    gateway: Arc<dyn BackendGateway>,
    notifier: Arc<dyn Notifier>,
    debouncer: DistinctDebouncer<String>,
    blur_grace: Duration,
    blur_deadline: Option<Instant>,
    session_token: String,
    latest_sequence: u64,
    in_flight: Option<JoinHandle<()>>,
    state: AutocompleteView,
    view: watch::Sender<AutocompleteView>,
    resolved: mpsc::UnboundedSender<ResolvedLocation>,
}

async fn sleep_until_some(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn new_session_token() -> String {
    Uuid::new_v4().to_string()
}

impl AutocompleteController {
    pub fn new(
        gateway: Arc<dyn BackendGateway>,
        notifier: Arc<dyn Notifier>,
        timings: &Timings,
        resolved: mpsc::UnboundedSender<ResolvedLocation>,
    ) -> (Self, watch::Receiver<AutocompleteView>) {
        let (view, view_rx) = watch::channel(AutocompleteView::default());
        let controller = Self {
            gateway,
            notifier,
            debouncer: DistinctDebouncer::new(timings.autocomplete_debounce),
            blur_grace: timings.blur_grace,
            blur_deadline: None,
            session_token: new_session_token(),
            latest_sequence: 0,
            in_flight: None,
            state: AutocompleteView::default(),
            view,
            resolved,
        };
        (controller, view_rx)
    }

    /// Starts the controller on its own task. Resolved locations arrive on the returned receiver.
    pub fn spawn(
        gateway: Arc<dyn BackendGateway>,
        notifier: Arc<dyn Notifier>,
        timings: &Timings,
    ) -> (AutocompleteHandle, mpsc::UnboundedReceiver<ResolvedLocation>, JoinHandle<()>) {
        let (resolved_tx, resolved_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (controller, view) = Self::new(gateway, notifier, timings, resolved_tx);
        let task = tokio::spawn(controller.run(events_rx));
        let handle = AutocompleteHandle {
            events: events_tx,
            view,
        };
        (handle, resolved_rx, task)
    }

    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<AutocompleteEvent>) {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Outcome>();

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event, &done_tx),
                    None => break,
                },
                Some(outcome) = done_rx.recv() => match outcome {
                    Outcome::Fetch(outcome) => self.apply_fetch(outcome),
                    Outcome::Place(outcome) => self.apply_place(outcome),
                },
                _ = sleep_until_some(self.debouncer.deadline()) => self.flush_debounce(&done_tx),
                _ = sleep_until_some(self.blur_deadline) => self.hide_after_blur(),
            }
            self.publish();
        }

        self.invalidate_fetch();
        debug!("Autocomplete controller stopped");
    }

    fn publish(&self) {
        self.view.send_replace(self.state.clone());
    }

    fn handle_event(&mut self, event: AutocompleteEvent, done_tx: &mpsc::UnboundedSender<Outcome>) {
        match event {
            AutocompleteEvent::Input(text) => {
                self.state.text = text.clone();
                self.debouncer.push(text, Instant::now());
                self.state.phase = AutocompletePhase::Debouncing;
            }
            AutocompleteEvent::Key(key) => self.handle_key(key, done_tx),
            AutocompleteEvent::Select(index) => {
                if self.state.dropdown_visible && index < self.state.predictions.len() {
                    self.select(index, done_tx);
                }
            }
            AutocompleteEvent::Focus => {
                self.blur_deadline = None;
                if !self.state.predictions.is_empty() && !self.state.dropdown_visible {
                    self.state.dropdown_visible = true;
                    self.state.phase = AutocompletePhase::Showing;
                }
            }
            AutocompleteEvent::Blur => {
                // Late enough for a click on a row to land first.
                self.blur_deadline = Some(Instant::now() + self.blur_grace);
            }
        }
    }

    fn handle_key(&mut self, key: NavigationKey, done_tx: &mpsc::UnboundedSender<Outcome>) {
        let count = self.state.predictions.len();
        if !self.state.dropdown_visible || count == 0 {
            return;
        }

        match key {
            NavigationKey::ArrowDown => {
                self.state.active_index = Some(match self.state.active_index {
                    Some(index) => (index + 1) % count,
                    None => 0,
                });
                self.state.phase = AutocompletePhase::Navigating;
            }
            NavigationKey::ArrowUp => {
                self.state.active_index = Some(match self.state.active_index {
                    Some(index) => (index + count - 1) % count,
                    None => count - 1,
                });
                self.state.phase = AutocompletePhase::Navigating;
            }
            NavigationKey::Enter => {
                if let Some(index) = self.state.active_index {
                    self.select(index, done_tx);
                }
            }
            NavigationKey::Escape => {
                self.state.dropdown_visible = false;
                self.state.active_index = None;
                self.state.phase = AutocompletePhase::Idle;
            }
        }
    }

    fn flush_debounce(&mut self, done_tx: &mpsc::UnboundedSender<Outcome>) {
        let query = match self.debouncer.fire(Instant::now()) {
            Some(query) => query,
            None => {
                self.state.phase = if self.state.dropdown_visible {
                    AutocompletePhase::Showing
                } else {
                    AutocompletePhase::Idle
                };
                return;
            }
        };

        if query.trim().chars().count() < MIN_QUERY_CHARS {
            debug!("Query '{}' too short, clearing predictions", query);
            self.invalidate_fetch();
            self.clear_predictions();
            return;
        }

        self.dispatch_fetch(query, done_tx);
    }

    fn dispatch_fetch(&mut self, query: String, done_tx: &mpsc::UnboundedSender<Outcome>) {
        self.invalidate_fetch();
        let sequence = self.latest_sequence;
        debug!("Fetching predictions #{} for '{}'", sequence, query);

        let gateway = self.gateway.clone();
        let session_token = self.session_token.clone();
        let done_tx = done_tx.clone();
        self.in_flight = Some(tokio::spawn(async move {
            let result = gateway.autocomplete(&query, &session_token).await;
            let _ = done_tx.send(Outcome::Fetch(FetchOutcome { sequence, query, result }));
        }));
        self.state.phase = AutocompletePhase::Fetching;
    }

    /// Aborts the in-flight fetch and makes any answer it still delivers stale.
    fn invalidate_fetch(&mut self) {
        self.latest_sequence += 1;
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
    }

    fn apply_fetch(&mut self, outcome: FetchOutcome) {
        if outcome.sequence != self.latest_sequence {
            debug!("Discarding stale predictions #{} for '{}'", outcome.sequence, outcome.query);
            return;
        }
        self.in_flight = None;

        match outcome.result {
            Ok(predictions) => {
                self.state.dropdown_visible = !predictions.is_empty();
                self.state.predictions = predictions;
                self.state.active_index = None;
                self.state.phase = if self.state.dropdown_visible {
                    AutocompletePhase::Showing
                } else {
                    AutocompletePhase::Idle
                };
            }
            Err(e) => {
                warn!("Something went wrong fetching predictions for '{}' due to: {}", outcome.query, e);
                self.clear_predictions();
            }
        }
    }

    fn clear_predictions(&mut self) {
        self.state.predictions.clear();
        self.state.dropdown_visible = false;
        self.state.active_index = None;
        self.state.phase = AutocompletePhase::Idle;
    }

    fn hide_after_blur(&mut self) {
        self.blur_deadline = None;
        self.state.dropdown_visible = false;
        self.state.active_index = None;
        if matches!(self.state.phase, AutocompletePhase::Showing | AutocompletePhase::Navigating) {
            self.state.phase = AutocompletePhase::Idle;
        }
    }

    /// Resolution runs on its own task so input keeps flowing while it is pending.
    fn select(&mut self, index: usize, done_tx: &mpsc::UnboundedSender<Outcome>) {
        let prediction = match self.state.predictions.get(index) {
            Some(prediction) => prediction.clone(),
            None => return,
        };

        self.invalidate_fetch();
        self.debouncer.settle_on(prediction.description.clone());
        self.blur_deadline = None;
        self.state.text = prediction.description.clone();
        self.clear_predictions();
        self.state.phase = AutocompletePhase::Resolving;

        let gateway = self.gateway.clone();
        let session_token = self.session_token.clone();
        let done_tx = done_tx.clone();
        tokio::spawn(async move {
            let result = gateway.place_details(&prediction.id, &session_token).await;
            let _ = done_tx.send(Outcome::Place(PlaceOutcome { prediction, result }));
        });
    }

    fn apply_place(&mut self, outcome: PlaceOutcome) {
        if self.state.phase == AutocompletePhase::Resolving {
            self.state.phase = AutocompletePhase::Idle;
        }

        let prediction = outcome.prediction;
        match outcome.result {
            Ok(details) => {
                info!("Resolved '{}' to {}, {}", prediction.description, details.location.latitude, details.location.longitude);
                self.session_token = new_session_token();
                let location = ResolvedLocation {
                    address: details.formatted_address,
                    coordinates: details.location,
                };
                if self.resolved.send(location).is_err() {
                    warn!("Nobody is listening for resolved locations");
                }
            }
            Err(e) => {
                warn!("Something went wrong resolving place {} due to: {}", prediction.id, e);
                self.notifier.alert(PLACE_DETAILS_FAILED);
            }
        }
    }
}
