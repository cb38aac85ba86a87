use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("consolechat.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter =
    Counter::new("consolechat.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("consolechat.client.request_duration_seconds");

pub(crate) static SESSION_TURNS: Counter = Counter::new("consolechat.session.turns");
pub(crate) static SESSION_EMPTY_RESPONSES: Counter =
    Counter::new("consolechat.session.empty_responses");
pub(crate) static SESSION_RETRIES: Counter = Counter::new("consolechat.session.retries");
pub(crate) static SESSION_ROLLBACKS: Counter = Counter::new("consolechat.session.rollbacks");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&SESSION_TURNS);
    collector.register_counter(&SESSION_EMPTY_RESPONSES);
    collector.register_counter(&SESSION_RETRIES);
    collector.register_counter(&SESSION_ROLLBACKS);
}
