//! Port-number → ordered handler registry.
//!
//! Grounded on `bridger/mesh/handler_registry.py`: a process-wide map built
//! once at startup (there, a `defaultdict(list)` populated by an `@handler`
//! decorator at import time; here, a `once_cell::sync::Lazy` built by an
//! explicit registration function, per the design-notes preference for
//! "static construction over import-time side effects").

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::error::ProcessingError;
use crate::model::{Header, TypedPoint};
use crate::proto::port_num;

mod neighborinfo;
mod nodeinfo;
mod position;
mod telemetry;
mod text;
mod traceroute;

/// Options threaded through every handler invocation. Grounded on the
/// `strip_text`/`force_decode` flags in `bridger/mesh/__init__.py`.
#[derive(Clone, Copy, Debug)]
pub struct HandlerOptions {
    pub force_decode: bool,
    pub strip_text: bool,
}

impl Default for HandlerOptions {
    fn default() -> Self {
        Self {
            force_decode: false,
            strip_text: true,
        }
    }
}

/// A handler interprets `payload` for a specific port. `Ok(None)` means "not
/// my variant, try the next handler registered for this port".
pub type HandlerFn = fn(&Header, &[u8], &HandlerOptions) -> Result<Option<Vec<TypedPoint>>, ProcessingError>;

static REGISTRY: Lazy<HashMap<i32, Vec<HandlerFn>>> = Lazy::new(build_registry);

fn build_registry() -> HashMap<i32, Vec<HandlerFn>> {
    let mut map: HashMap<i32, Vec<HandlerFn>> = HashMap::new();
    map.entry(port_num::NODEINFO_APP).or_default().push(nodeinfo::handle);
    map.entry(port_num::POSITION_APP).or_default().push(position::handle);
    map.entry(port_num::TELEMETRY_APP).or_default().push(telemetry::handle);
    map.entry(port_num::NEIGHBORINFO_APP).or_default().push(neighborinfo::handle);
    map.entry(port_num::TEXT_MESSAGE_APP).or_default().push(text::handle);
    map.entry(port_num::TRACEROUTE_APP).or_default().push(traceroute::handle);
    map
}

pub fn is_registered(portnum: i32) -> bool {
    REGISTRY.contains_key(&portnum)
}

/// Runs every handler registered for `header`'s port in order, returning the
/// first non-`None` result. Returns an empty vec when the port is registered
/// but no handler matched (e.g. a Position payload with no coordinates).
pub fn dispatch(
    header: &Header,
    portnum: i32,
    payload: &[u8],
    opts: &HandlerOptions,
) -> Result<Vec<TypedPoint>, ProcessingError> {
    let handlers = REGISTRY.get(&portnum).ok_or_else(|| {
        ProcessingError::new(format!("no handler registered for port {portnum}"), Some(portnum))
    })?;

    for handler in handlers {
        if let Some(points) = handler(header, payload, opts)? {
            return Ok(points);
        }
    }
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_ports_are_registered() {
        assert!(is_registered(port_num::NODEINFO_APP));
        assert!(is_registered(port_num::POSITION_APP));
        assert!(is_registered(port_num::TELEMETRY_APP));
        assert!(is_registered(port_num::NEIGHBORINFO_APP));
        assert!(is_registered(port_num::TEXT_MESSAGE_APP));
        assert!(is_registered(port_num::TRACEROUTE_APP));
    }

    #[test]
    fn unknown_port_is_not_registered() {
        assert!(!is_registered(999));
    }
}
