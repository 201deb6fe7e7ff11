use po3_core::*;
use po3_journal::Journal;
use po3_risk::{Checklist, PhaseProfile, TradingPhase};
use po3_service::{Topic, TradingService};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Events buffered per stream client before it starts lagging.
const EVENT_BUFFER: usize = 256;

/// Shared application state accessible by all route handlers.
pub struct AppState {
    pub service: Arc<TradingService>,
    /// Every bus event, re-broadcast to `/api/stream` clients.
    pub events: broadcast::Sender<TradingEvent>,
    pub phase: TradingPhase,
    /// Starting balance used by progress reports that do not name one.
    pub initial_balance: Option<Decimal>,
    pub checklist: RwLock<Checklist>,
    pub journal: RwLock<Journal>,
    /// CSV file the journal is saved to after each change.
    pub journal_path: Option<PathBuf>,
}

impl AppState {
    pub fn new(service: Arc<TradingService>) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        forward::<AccountUpdate>(&service, &events, TradingEvent::AccountUpdate);
        forward::<PositionsUpdate>(&service, &events, TradingEvent::PositionsUpdate);
        forward::<OrdersUpdate>(&service, &events, TradingEvent::OrdersUpdate);
        forward::<MarketDataUpdate>(&service, &events, TradingEvent::MarketDataUpdate);
        forward::<StreamFault>(&service, &events, TradingEvent::StreamFault);

        Self {
            service,
            events,
            phase: TradingPhase::default(),
            initial_balance: None,
            checklist: RwLock::new(Checklist::po3()),
            journal: RwLock::new(Journal::new()),
            journal_path: None,
        }
    }

    pub fn with_phase(mut self, phase: TradingPhase) -> Self {
        self.phase = phase;
        self
    }

    pub fn with_initial_balance(mut self, initial_balance: Option<Decimal>) -> Self {
        self.initial_balance = initial_balance;
        self
    }

    pub fn with_journal(mut self, journal: Journal, path: Option<PathBuf>) -> Self {
        self.journal = RwLock::new(journal);
        self.journal_path = path;
        self
    }

    /// Profile for `phase`, or the desk's configured phase.
    pub fn profile(&self, phase: Option<TradingPhase>) -> PhaseProfile {
        phase.unwrap_or(self.phase).profile()
    }
}

fn forward<E: Topic + Clone>(
    service: &TradingService,
    events: &broadcast::Sender<TradingEvent>,
    wrap: fn(E) -> TradingEvent,
) {
    let events = events.clone();
    service.subscribe(move |event: &E| {
        // No stream clients is not a failure.
        let _ = events.send(wrap(event.clone()));
        Ok(())
    });
}
