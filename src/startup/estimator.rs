//! Progress estimation from registry state

use crate::startup::registry::LoadStatus;

/// Credit given to each in-flight resource, as a share of one resource
const IN_FLIGHT_CREDIT: f64 = 0.2;
/// The in-flight bonus never exceeds this much over raw progress
const IN_FLIGHT_CAP: f64 = 0.1;
/// Highest target shown while loading is not done
const INCOMPLETE_CEILING: f64 = 0.95;

/// `settled / total`, 0 for an empty registry.
pub fn raw_progress(settled: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    settled as f64 / total as f64
}

/// Raw progress plus partial credit for resources currently loading.
pub fn in_flight_estimate(status: &LoadStatus) -> f64 {
    if status.total == 0 {
        return 0.0;
    }

    let base = raw_progress(status.loaded, status.total);
    let bonus = status.in_flight() as f64 * IN_FLIGHT_CREDIT / status.total as f64;
    (base + bonus).min(base + IN_FLIGHT_CAP)
}

/// Value the presenter animates toward.
pub fn presenter_target(status: &LoadStatus) -> f64 {
    if status.is_done() {
        return 1.0;
    }
    in_flight_estimate(status).min(INCOMPLETE_CEILING)
}
