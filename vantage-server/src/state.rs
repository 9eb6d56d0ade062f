use vantage_core::broker::LogBroker;
use vantage_core::dispatcher::ScanDispatcher;
use vantage_core::store::Stores;

/// Shared application state handed to every handler.
#[derive(Clone, Debug)]
pub struct AppState {
    pub dispatcher: ScanDispatcher,
    pub stores: Stores,
    pub broker: LogBroker,
}

impl AppState {
    pub fn new(dispatcher: ScanDispatcher, stores: Stores) -> Self {
        let broker = dispatcher.broker().clone();
        Self {
            dispatcher,
            stores,
            broker,
        }
    }
}
