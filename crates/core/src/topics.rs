//! Sensor bus topic naming.
//!
//! Requests go out on `<ns>/read/request/<treeID>/<jobID>` and devices
//! answer on `<ns>/read/response/<jobID>`. The job id is always the last
//! segment, which is what correlates a reply to its job.

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "npk";

/// Single-level wildcard.
pub const WILDCARD_ONE: &str = "+";

/// Multi-level wildcard; only valid as the last filter segment.
pub const WILDCARD_REST: &str = "#";

/// Topic a measurement request for `tree_id` is published on.
pub fn request_topic(namespace: &str, tree_id: &str, job_id: &str) -> String {
    format!("{namespace}/read/request/{tree_id}/{job_id}")
}

/// Topic the device replies on for `job_id`.
pub fn response_topic(namespace: &str, job_id: &str) -> String {
    format!("{namespace}/read/response/{job_id}")
}

/// Subscription filter matching every reply in `namespace`.
pub fn response_filter(namespace: &str) -> String {
    format!("{namespace}/read/response/{WILDCARD_ONE}")
}

/// Extract the trailing segment of a topic as the job id.
///
/// Returns `None` for an empty trailing segment.
pub fn job_id_from_topic(topic: &str) -> Option<&str> {
    topic.rsplit('/').next().filter(|segment| !segment.is_empty())
}

/// Job id of a reply topic in `namespace`.
///
/// Returns `None` for any topic outside `<ns>/read/response/+`, such as
/// request topics seen through a broader subscription.
pub fn response_job_id<'a>(namespace: &str, topic: &'a str) -> Option<&'a str> {
    if !topic_matches(&response_filter(namespace), topic) {
        return None;
    }
    job_id_from_topic(topic)
}

/// Check whether `topic` matches a subscription `filter`.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_parts = filter.split('/');
    let mut topic_parts = topic.split('/');

    loop {
        match (filter_parts.next(), topic_parts.next()) {
            (Some(WILDCARD_REST), _) => return filter_parts.next().is_none(),
            (Some(WILDCARD_ONE), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
