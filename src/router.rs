//! Event-to-subscription routing.

use crate::models::Config;

/// Match an event's canonical type against subscription snapshots.
///
/// A subscription matches when it is active and lists the exact canonical
/// type. Pure function: any case or prefix normalization happens before
/// routing (see [`crate::models::EventMessage::canonical_type`]).
#[must_use]
pub fn route<'a>(event_type: &str, configs: &'a [Config]) -> Vec<&'a Config> {
    configs.iter().filter(|c| c.matches(event_type)).collect()
}
