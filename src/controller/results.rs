use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};
use crate::config::Timings;
use crate::controller::search::{SearchError, SearchOrchestrator};
use crate::error::GatewayError;
use crate::models::restaurant::Restaurant;
use crate::models::user_choice::UserChoice;
use crate::repositories::gateway::BackendGateway;

/// Lets one reroll run at a time.
///
/// Finishing a reroll drops its ticket, which reopens the gate. A ticket that is
/// never dropped stops blocking after `safety_net`.
#[derive(Clone)]
pub struct RerollGate {
    busy_since: Arc<Mutex<Option<Instant>>>,
    safety_net: Duration,
}

pub struct RerollTicket {
    busy_since: Arc<Mutex<Option<Instant>>>,
    issued_at: Instant,
}

impl RerollGate {
    pub fn new(safety_net: Duration) -> Self {
        Self {
            busy_since: Arc::new(Mutex::new(None)),
            safety_net,
        }
    }

    pub fn try_acquire(&self) -> Option<RerollTicket> {
        let mut busy_since = self.busy_since.lock().ok()?;
        if let Some(since) = *busy_since {
            if since.elapsed() < self.safety_net {
                return None;
            }
            warn!("Reroll still marked busy after {:?}, releasing it", self.safety_net);
        }

        let issued_at = Instant::now();
        *busy_since = Some(issued_at);
        Some(RerollTicket {
            busy_since: self.busy_since.clone(),
            issued_at,
        })
    }

    pub fn is_busy(&self) -> bool {
        match self.busy_since.lock() {
            Ok(busy_since) => busy_since.map_or(false, |since| since.elapsed() < self.safety_net),
            Err(_) => false,
        }
    }
}

impl Drop for RerollTicket {
    fn drop(&mut self) {
        if let Ok(mut busy_since) = self.busy_since.lock() {
            // A newer ticket may have replaced this one via the safety net.
            if *busy_since == Some(self.issued_at) {
                *busy_since = None;
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DetailView {
    pub restaurant: Restaurant,
    pub summary_loading: bool,
}

/// Which restaurant's detail is open and whether its summary is still on the way.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetailSelection {
    pub restaurant_id: String,
    pub summary_loading: bool,
}

/// Cloning is cheap; clones share the open detail and the reroll gate.
#[derive(Clone)]
pub struct ResultsPresenter {
    orchestrator: SearchOrchestrator,
    gateway: Arc<dyn BackendGateway>,
    reroll_gate: RerollGate,
    selection: Arc<watch::Sender<Option<DetailSelection>>>,
}

impl ResultsPresenter {
    pub fn new(
        orchestrator: SearchOrchestrator,
        gateway: Arc<dyn BackendGateway>,
        timings: &Timings,
    ) -> Self {
        let (selection, _) = watch::channel(None);
        Self {
            orchestrator,
            gateway,
            reroll_gate: RerollGate::new(timings.reroll_safety_net),
            selection: Arc::new(selection),
        }
    }

    pub fn restaurants(&self) -> Vec<Restaurant> {
        self.orchestrator.snapshot().restaurants
    }

    pub fn subscribe_detail(&self) -> watch::Receiver<Option<DetailSelection>> {
        self.selection.subscribe()
    }

    pub fn detail(&self) -> Option<DetailView> {
        let selection = self.selection.borrow().clone()?;
        let restaurant = self.orchestrator.restaurant(&selection.restaurant_id)?;
        Some(DetailView {
            restaurant,
            summary_loading: selection.summary_loading,
        })
    }

    /// Opens a restaurant's detail, fetching its summary only if none is cached yet.
    pub async fn open_detail(&self, restaurant_id: &str) -> Option<DetailView> {
        let restaurant = match self.orchestrator.restaurant(restaurant_id) {
            Some(restaurant) => restaurant,
            None => {
                warn!("No displayed restaurant with id {}", restaurant_id);
                return None;
            }
        };

        let cached = restaurant.ai_summary.is_some();
        self.selection.send_replace(Some(DetailSelection {
            restaurant_id: restaurant_id.to_string(),
            summary_loading: !cached,
        }));
        if cached {
            debug!("Summary for {} already loaded", restaurant_id);
            return self.detail();
        }

        let hints = self.orchestrator
            .last_request()
            .map(|request| request.summary_hints())
            .unwrap_or_default();
        match self.gateway.summary(restaurant_id, &hints).await {
            Ok(summary) => {
                self.orchestrator.attach_summary(summary);
            }
            Err(e) => {
                warn!("Something went wrong fetching summary for {} due to: {}", restaurant_id, e);
            }
        }

        // The user may have closed or switched the detail meanwhile.
        self.selection.send_if_modified(|selection| match selection {
            Some(open) if open.restaurant_id == restaurant_id && open.summary_loading => {
                open.summary_loading = false;
                true
            }
            _ => false,
        });
        self.detail()
    }

    pub fn close_detail(&self) {
        self.selection.send_if_modified(|selection| selection.take().is_some());
    }

    /// Starts a reroll unless one is already running. The returned task ends with the search.
    pub fn reroll(&self) -> Option<JoinHandle<Result<usize, SearchError>>> {
        let ticket = match self.reroll_gate.try_acquire() {
            Some(ticket) => ticket,
            None => {
                debug!("Reroll already in progress, ignoring");
                return None;
            }
        };
        self.close_detail();

        let orchestrator = self.orchestrator.clone();
        Some(tokio::spawn(async move {
            let result = orchestrator.reroll().await;
            drop(ticket);
            result
        }))
    }

    pub fn is_rerolling(&self) -> bool {
        self.reroll_gate.is_busy()
    }

    /// Tells the backend which result the user went with. Failures are only logged.
    pub async fn choose(&self, restaurant_id: &str) -> bool {
        let session_id = self.orchestrator.last_request().and_then(|r| r.session_id);
        let choice = UserChoice::now(restaurant_id, session_id);
        match self.gateway.record_choice(&choice).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Something went wrong recording choice {} due to: {}", restaurant_id, e);
                false
            }
        }
    }

    /// Fresh backend copy of one restaurant, outside the displayed list.
    pub async fn lookup(&self, restaurant_id: &str) -> Result<Restaurant, GatewayError> {
        self.gateway.restaurant(restaurant_id).await
    }
}
