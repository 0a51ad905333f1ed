//! Hardware terminals and their mutual-exclusion groups
//!
//! A `Port` is a named hardware pin or mix endpoint a route terminates on; a
//! `PortGroup` is a set of ports sharing a bus, of which at most one may be
//! in use at a time. Ports and groups live by value in the route collection
//! arena and reference each other through ids, so the blocking propagation
//! (port in use → siblings blocked → their routes blocked) is driven by the
//! collection rather than through pointer webs.

use crate::domain::audio::Direction;
use crate::domain::route::RouteId;

/// Index of a port within the route collection arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortId(pub(crate) usize);

/// Index of a port group within the route collection arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortGroupId(pub(crate) usize);

/// A named hardware terminal
#[derive(Debug)]
pub struct Port {
    name: String,
    blocked: bool,
    used: bool,
    /// Route attached per direction while the port is in use
    attached: [Option<RouteId>; Direction::COUNT],
    /// Groups this port belongs to
    groups: Vec<PortGroupId>,
    /// Routes potentially using this port
    users: Vec<RouteId>,
}

impl Port {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            blocked: false,
            used: false,
            attached: [None; Direction::COUNT],
            groups: Vec::new(),
            users: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    pub fn is_used(&self) -> bool {
        self.used
    }

    pub fn attached_route(&self, direction: Direction) -> Option<RouteId> {
        self.attached[direction.index()]
    }

    /// Clear used and blocked state at the start of a cycle
    pub fn reset_availability(&mut self) {
        self.used = false;
        self.blocked = false;
        self.attached = [None; Direction::COUNT];
    }

    pub(crate) fn set_blocked(&mut self, blocked: bool) -> bool {
        if self.blocked == blocked {
            return false;
        }
        self.blocked = blocked;
        true
    }

    pub(crate) fn set_used(&mut self, route: RouteId, direction: Direction) -> bool {
        if self.used {
            return false;
        }
        self.used = true;
        self.attached[direction.index()] = Some(route);
        true
    }

    pub(crate) fn add_group(&mut self, group: PortGroupId) {
        self.groups.push(group);
    }

    pub(crate) fn add_user(&mut self, route: RouteId) {
        self.users.push(route);
    }

    pub(crate) fn groups(&self) -> &[PortGroupId] {
        &self.groups
    }

    pub(crate) fn users(&self) -> &[RouteId] {
        &self.users
    }
}

/// A mutual-exclusion set of ports sharing a bus
#[derive(Debug)]
pub struct PortGroup {
    name: String,
    members: Vec<PortId>,
}

impl PortGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[PortId] {
        &self.members
    }

    pub(crate) fn add_member(&mut self, port: PortId) {
        self.members.push(port);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_clears_used_and_blocked() {
        let mut port = Port::new("codec_out");
        assert!(port.set_used(RouteId(0), Direction::Playback));
        assert!(port.set_blocked(true));
        assert_eq!(port.attached_route(Direction::Playback), Some(RouteId(0)));

        port.reset_availability();
        assert!(!port.is_used());
        assert!(!port.is_blocked());
        assert_eq!(port.attached_route(Direction::Playback), None);
    }

    #[test]
    fn set_used_is_first_wins() {
        let mut port = Port::new("codec_out");
        assert!(port.set_used(RouteId(0), Direction::Playback));
        // already in use, second route does not take over
        assert!(!port.set_used(RouteId(1), Direction::Playback));
        assert_eq!(port.attached_route(Direction::Playback), Some(RouteId(0)));
    }

    #[test]
    fn set_blocked_reports_edges_only() {
        let mut port = Port::new("bt_pcm");
        assert!(port.set_blocked(true));
        assert!(!port.set_blocked(true));
        assert!(port.set_blocked(false));
    }
}
