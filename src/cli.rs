use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use anyhow::Context;
use reqwest::Url;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use crate::config::{Config, Timings};
use crate::controller::autocomplete::{
    AutocompleteController, AutocompleteEvent, AutocompleteHandle, AutocompleteView, NavigationKey,
};
use crate::controller::geolocation::{FixedPositionSource, GeolocationProvider, NoPositionSource, PositionSource};
use crate::controller::results::{DetailSelection, ResultsPresenter};
use crate::controller::search::{SearchOrchestrator, SearchState};
use crate::controller::session::Session;
use crate::helpers::notifier::{ConsoleNotifier, Notifier};
use crate::models::restaurant::{ImageStatus, Restaurant};
use crate::models::search_request::SearchRequest;
use crate::repositories::backend_repo::BackendRepo;
use crate::repositories::gateway::{BackendGateway, HttpGateway};
use crate::repositories::image_probe::HttpImageProbe;
use crate::repositories::places_repo::{
    AuthFailureHooks, BackendPlacesProvider, GooglePlacesProvider, PlacesProvider, GOOGLE_PLACES_URL,
};

const HELP: &str = "\
Type an address to get suggestions. Commands:
  :down :up :enter :esc   move through / pick from / hide the suggestions
  :pick N                 click suggestion N
  :focus :blur            focus or leave the address field
  :go                     search the typed address
  :here                   search around your current location
  :open N  :close         show / hide details of result N
  :reroll                 new picks for the last search
  :choose N               tell us you went with result N
  :lookup N               reload result N from the backend
  :browse                 plain listing for the typed address
  :distance MILES  :rating STARS  :diet NAME  :style NAME  :prefs
  :help  :quit";

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Type(String),
    Key(NavigationKey),
    Pick(usize),
    Focus,
    Blur,
    Go,
    Here,
    Open(usize),
    Close,
    Reroll,
    Choose(usize),
    Lookup(usize),
    Browse,
    Distance(i64),
    Rating(f64),
    Diet(String),
    Style(String),
    Preferences,
    Help,
    Quit,
}

fn position(arg: &str) -> Result<usize, String> {
    match arg.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n - 1),
        _ => Err(format!("'{}' is not a list position", arg)),
    }
}

impl Command {
    /// Plain lines are address input; `:`-lines are gestures.
    pub fn parse(line: &str) -> Result<Command, String> {
        let Some(gesture) = line.strip_prefix(':') else {
            return Ok(Command::Type(line.to_string()));
        };
        let (name, arg) = match gesture.trim().split_once(' ') {
            Some((name, arg)) => (name, arg.trim()),
            None => (gesture.trim(), ""),
        };

        let command = match (name, arg) {
            ("down", "") => Command::Key(NavigationKey::ArrowDown),
            ("up", "") => Command::Key(NavigationKey::ArrowUp),
            ("enter", "") => Command::Key(NavigationKey::Enter),
            ("esc", "") => Command::Key(NavigationKey::Escape),
            ("pick", n) => Command::Pick(position(n)?),
            ("focus", "") => Command::Focus,
            ("blur", "") => Command::Blur,
            ("go", "") => Command::Go,
            ("here", "") => Command::Here,
            ("open", n) => Command::Open(position(n)?),
            ("close", "") => Command::Close,
            ("reroll", "") => Command::Reroll,
            ("choose", n) => Command::Choose(position(n)?),
            ("lookup", n) => Command::Lookup(position(n)?),
            ("browse", "") => Command::Browse,
            ("distance", miles) => Command::Distance(
                miles.parse().map_err(|_| format!("'{}' is not a whole number of miles", miles))?,
            ),
            ("rating", stars) => match stars.parse::<f64>() {
                Ok(rating) if rating.is_finite() => Command::Rating(rating),
                _ => return Err(format!("'{}' is not a rating", stars)),
            },
            ("diet", name) if !name.is_empty() => Command::Diet(name.to_string()),
            ("style", name) if !name.is_empty() => Command::Style(name.to_string()),
            ("prefs", "") => Command::Preferences,
            ("help", "") => Command::Help,
            ("quit", "") | ("q", "") => Command::Quit,
            _ => return Err(format!("Unknown command ':{}', try :help", gesture.trim())),
        };
        Ok(command)
    }
}

/// Shows one alert per run when the places provider rejects our key.
fn alert_on_auth_failure(hooks: &AuthFailureHooks, notifier: Arc<dyn Notifier>) {
    let alerted = AtomicBool::new(false);
    hooks.register(move |failure| {
        if !alerted.swap(true, Ordering::SeqCst) {
            notifier.alert(&format!(
                "{} rejected our credentials ({}). Address suggestions are unavailable.",
                failure.provider, failure.status
            ));
        }
    });
}

fn places_provider(
    config: &Config,
    http: &reqwest::Client,
    backend: &BackendRepo,
) -> anyhow::Result<Arc<dyn PlacesProvider>> {
    let provider: Arc<dyn PlacesProvider> = match config.maps_api_key() {
        Some(key) => Arc::new(GooglePlacesProvider::new(
            http.clone(),
            Url::parse(GOOGLE_PLACES_URL).context("Invalid places URL")?,
            key.to_string(),
        )),
        None => Arc::new(BackendPlacesProvider::new(backend.clone())),
    };
    info!("Address suggestions from {}", provider.name());
    Ok(provider)
}

fn start_search(orchestrator: &SearchOrchestrator, request: SearchRequest) {
    if orchestrator.snapshot().loading {
        println!("A search is already running.");
        return;
    }
    let orchestrator = orchestrator.clone();
    tokio::spawn(async move {
        if let Err(e) = orchestrator.search(request).await {
            debug!("Search ended without results: {}", e);
        }
    });
}

fn describe(index: usize, restaurant: &Restaurant) -> String {
    let open = match restaurant.open_now {
        Some(true) => " | open now",
        Some(false) => " | closed",
        None => "",
    };
    let photo = match restaurant.image {
        ImageStatus::Loaded => " | photo",
        ImageStatus::Unavailable => " | photo unavailable",
        ImageStatus::Absent | ImageStatus::Unchecked => "",
    };
    format!(
        "{}. {} ({}★, {}, {:.1} mi){}{}\n   {}",
        index + 1,
        restaurant.name,
        restaurant.rating,
        restaurant.price_label(),
        restaurant.distance,
        open,
        photo,
        restaurant.address,
    )
}

/// Prints only what changed since the last render.
#[derive(Default)]
struct Renderer {
    status: Option<String>,
    loading: bool,
    dropdown: Option<Vec<String>>,
    active_index: Option<usize>,
    summary_loading: bool,
}

impl Renderer {
    fn search(&mut self, state: &SearchState) {
        if state.status != self.status {
            if let Some(status) = &state.status {
                println!("… {}", status);
            }
            self.status = state.status.clone();
        }

        if self.loading && !state.loading && !state.restaurants.is_empty() {
            println!();
            for (index, restaurant) in state.restaurants.iter().enumerate() {
                println!("{}", describe(index, restaurant));
            }
            println!();
        } else if self.loading && !state.loading && state.last_request.is_some() {
            println!("No results to show.");
        }
        self.loading = state.loading;
    }

    fn detail(&mut self, selection: &Option<DetailSelection>) {
        let loading = selection.as_ref().map_or(false, |s| s.summary_loading);
        if loading && !self.summary_loading {
            println!("… Loading the summary");
        }
        self.summary_loading = loading;
    }

    fn autocomplete(&mut self, view: &AutocompleteView) {
        let dropdown = view.dropdown_visible.then(|| {
            view.predictions
                .iter()
                .map(|p| p.description.clone())
                .collect::<Vec<_>>()
        });

        if dropdown != self.dropdown || (dropdown.is_some() && view.active_index != self.active_index) {
            if let Some(rows) = &dropdown {
                for (index, row) in rows.iter().enumerate() {
                    let marker = if view.active_index == Some(index) { '>' } else { ' ' };
                    println!("{} {}. {}", marker, index + 1, row);
                }
            }
        }
        self.dropdown = dropdown;
        self.active_index = view.active_index;
    }
}

struct Client {
    session: Session,
    presenter: ResultsPresenter,
    autocomplete: AutocompleteHandle,
}

impl Client {
    fn displayed_id(&self, index: usize) -> Option<String> {
        let id = self.presenter.restaurants().get(index).map(|r| r.id.clone());
        if id.is_none() {
            println!("There is no result {}.", index + 1);
        }
        id
    }

    /// Returns false when the user asked to quit.
    async fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Type(text) => {
                self.autocomplete.send(AutocompleteEvent::Input(text));
            }
            Command::Key(key) => {
                self.autocomplete.send(AutocompleteEvent::Key(key));
            }
            Command::Pick(index) => {
                self.autocomplete.send(AutocompleteEvent::Select(index));
            }
            Command::Focus => {
                self.autocomplete.send(AutocompleteEvent::Focus);
            }
            Command::Blur => {
                self.autocomplete.send(AutocompleteEvent::Blur);
            }
            Command::Go => {
                let text = self.autocomplete.view().text;
                match self.session.request_for_address(&text).await {
                    Some(request) => start_search(self.session.orchestrator(), request),
                    None => println!("Type an address first."),
                }
            }
            Command::Here => {
                println!("Locating you...");
                if let Some(request) = self.session.request_for_current_location().await {
                    start_search(self.session.orchestrator(), request);
                }
            }
            Command::Open(index) => {
                if let Some(id) = self.displayed_id(index) {
                    let presenter = self.presenter.clone();
                    tokio::spawn(async move {
                        if let Some(detail) = presenter.open_detail(&id).await {
                            print_detail(&detail.restaurant);
                        }
                    });
                }
            }
            Command::Close => self.presenter.close_detail(),
            Command::Reroll => {
                if self.session.orchestrator().last_request().is_none() {
                    println!("Search for something first.");
                } else if self.presenter.reroll().is_none() {
                    println!("Already finding new picks...");
                }
            }
            Command::Choose(index) => {
                if let Some(id) = self.displayed_id(index) {
                    if self.presenter.choose(&id).await {
                        println!("Enjoy your pizza!");
                    }
                }
            }
            Command::Lookup(index) => {
                if let Some(id) = self.displayed_id(index) {
                    match self.presenter.lookup(&id).await {
                        Ok(restaurant) => println!("{}", describe(index, &restaurant)),
                        Err(e) => println!("Could not reload that restaurant: {}", e),
                    }
                }
            }
            Command::Browse => {
                let text = self.autocomplete.view().text;
                match self.session.browse(&text).await {
                    Ok(restaurants) => {
                        for (index, restaurant) in restaurants.iter().enumerate() {
                            println!("{}", describe(index, restaurant));
                        }
                    }
                    Err(e) => println!("Browsing failed: {}", e),
                }
            }
            Command::Distance(miles) => {
                let stored = self.session.preferences_mut().commit_max_distance(miles);
                println!("Max distance: {} mi", stored);
            }
            Command::Rating(stars) => {
                if !self.session.preferences_mut().set_min_rating(stars) {
                    println!("'{}' is not a rating", stars);
                }
                println!("Min rating: {}", self.session.preferences().min_rating);
            }
            Command::Diet(name) => {
                let on = self.session.preferences_mut().toggle_dietary_restriction(&name);
                println!("{} {}", name, if on { "on" } else { "off" });
            }
            Command::Style(name) => {
                let on = self.session.preferences_mut().toggle_favorite_style(&name);
                println!("{} {}", name, if on { "on" } else { "off" });
            }
            Command::Preferences => {
                let preferences = self.session.preferences();
                println!(
                    "Within {} mi, at least {}★, dietary: {:?}, styles: {:?}",
                    preferences.max_distance,
                    preferences.min_rating,
                    preferences.dietary_restrictions,
                    preferences.favorite_styles,
                );
            }
            Command::Help => println!("{}", HELP),
            Command::Quit => return false,
        }
        true
    }
}

fn print_detail(restaurant: &Restaurant) {
    println!("\n{}, {}", restaurant.name, restaurant.address);
    if let Some(phone) = &restaurant.phone {
        println!("  {}", phone);
    }
    if let Some(website) = &restaurant.website {
        println!("  {}", website);
    }
    match &restaurant.ai_summary {
        Some(summary) => {
            println!("  {}", summary.summary);
            for highlight in &summary.highlights {
                println!("  + {}", highlight);
            }
            for recommendation in &summary.recommendations {
                println!("  try: {}", recommendation);
            }
        }
        None => println!("  No summary available right now."),
    }
    println!();
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    let timings = Timings::default();
    let base_url = config.api_base_url()?;
    let http = reqwest::Client::builder()
        .user_agent(concat!("parlor-client/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build the HTTP client")?;

    let backend = BackendRepo::new(http.clone(), base_url.clone());
    let places = places_provider(&config, &http, &backend)?;
    let notifier: Arc<dyn Notifier> = Arc::new(ConsoleNotifier);
    alert_on_auth_failure(places.auth_failures(), notifier.clone());
    let gateway: Arc<dyn BackendGateway> = Arc::new(HttpGateway::new(backend, places));

    let source: Arc<dyn PositionSource> = match config.fixed_position() {
        Some(position) => Arc::new(FixedPositionSource(position)),
        None => Arc::new(NoPositionSource),
    };
    let orchestrator = SearchOrchestrator::new(
        gateway.clone(),
        Arc::new(HttpImageProbe::new(http)),
        notifier.clone(),
        &timings,
    );
    let mut session = Session::new(
        gateway.clone(),
        notifier.clone(),
        GeolocationProvider::new(source, &timings),
        orchestrator.clone(),
    );
    session.load_saved_preferences().await;
    let presenter = ResultsPresenter::new(orchestrator.clone(), gateway.clone(), &timings);
    let (autocomplete, mut resolved, autocomplete_task) =
        AutocompleteController::spawn(gateway, notifier, &timings);

    info!("Using API at {}", base_url);
    println!("{}", HELP);

    let mut search_state = orchestrator.subscribe();
    let mut view = autocomplete.subscribe();
    let mut detail = presenter.subscribe_detail();
    let mut renderer = Renderer::default();
    let mut client = Client {
        session,
        presenter,
        autocomplete,
    };
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line.context("Failed to read from stdin")? {
                    Some(line) => line,
                    None => break,
                };
                match Command::parse(&line) {
                    Ok(command) => {
                        if !client.handle(command).await {
                            break;
                        }
                    }
                    Err(message) => println!("{}", message),
                }
            }
            Some(location) = resolved.recv() => {
                println!("Searching near {}...", location.address);
                start_search(&orchestrator, client.session.request_for_location(&location));
            }
            changed = search_state.changed() => {
                if changed.is_err() {
                    break;
                }
                renderer.search(&search_state.borrow_and_update());
            }
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                renderer.autocomplete(&view.borrow_and_update());
            }
            changed = detail.changed() => {
                if changed.is_err() {
                    break;
                }
                renderer.detail(&detail.borrow_and_update());
            }
        }
    }

    drop(client);
    autocomplete_task.await.context("Autocomplete controller crashed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_are_address_input() {
        assert_eq!(Command::parse("Joe's Pizza"), Ok(Command::Type("Joe's Pizza".to_string())));
        assert_eq!(Command::parse(""), Ok(Command::Type(String::new())));
    }

    #[test]
    fn gestures_use_one_based_positions() {
        assert_eq!(Command::parse(":down"), Ok(Command::Key(NavigationKey::ArrowDown)));
        assert_eq!(Command::parse(":pick 2"), Ok(Command::Pick(1)));
        assert_eq!(Command::parse(":open 1"), Ok(Command::Open(0)));
        assert!(Command::parse(":open 0").is_err());
        assert!(Command::parse(":open").is_err());
    }

    #[test]
    fn preference_edits_are_parsed() {
        assert_eq!(Command::parse(":distance 80"), Ok(Command::Distance(80)));
        assert_eq!(Command::parse(":distance -3"), Ok(Command::Distance(-3)));
        assert_eq!(Command::parse(":rating 4.5"), Ok(Command::Rating(4.5)));
        assert_eq!(Command::parse(":diet Gluten-Free"), Ok(Command::Diet("Gluten-Free".to_string())));
        assert!(Command::parse(":diet").is_err());
        assert!(Command::parse(":rating NaN").is_err());
        assert!(Command::parse(":rating inf").is_err());
        assert!(Command::parse(":distance far").is_err());
        assert!(Command::parse(":teleport").is_err());
    }
}
