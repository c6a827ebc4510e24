use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("gemchat.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("gemchat.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("gemchat.client.request_duration_seconds");
pub(crate) static CLIENT_EMPTY_REPLIES: Counter = Counter::new("gemchat.client.empty_replies");

pub(crate) static HISTORY_PRUNED_MESSAGES: Counter =
    Counter::new("gemchat.history.pruned_messages");
pub(crate) static HISTORY_SAVES: Counter = Counter::new("gemchat.history.saves");
pub(crate) static HISTORY_SAVE_ERRORS: Counter = Counter::new("gemchat.history.save_errors");

pub(crate) static INDICATOR_STARTS: Counter = Counter::new("gemchat.indicator.starts");
pub(crate) static INDICATOR_STOPS: Counter = Counter::new("gemchat.indicator.stops");

pub(crate) static SESSION_TURNS: Counter = Counter::new("gemchat.session.turns");
pub(crate) static SESSION_FAILED_TURNS: Counter = Counter::new("gemchat.session.failed_turns");
pub(crate) static RENDER_FALLBACKS: Counter = Counter::new("gemchat.render.fallbacks");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);
    collector.register_counter(&CLIENT_EMPTY_REPLIES);

    collector.register_counter(&HISTORY_PRUNED_MESSAGES);
    collector.register_counter(&HISTORY_SAVES);
    collector.register_counter(&HISTORY_SAVE_ERRORS);

    collector.register_counter(&INDICATOR_STARTS);
    collector.register_counter(&INDICATOR_STOPS);

    collector.register_counter(&SESSION_TURNS);
    collector.register_counter(&SESSION_FAILED_TURNS);
    collector.register_counter(&RENDER_FALLBACKS);
}

#[cfg(test)]
mod tests {
    use biometrics::Sensor;

    use super::*;

    #[test]
    fn counters_register_and_click() {
        register_biometrics(Collector::new());
        let before = SESSION_TURNS.read();
        SESSION_TURNS.click();
        assert!(SESSION_TURNS.read() > before);
    }
}
