// Reanimation ticket store
// Decision: Tickets are UUID v4 (OS randomness), keyed together with the user
//
// Lookup and removal are a single `remove` under the lock, so a ticket can
// never be redeemed twice. "Never issued" and "already redeemed" both read
// as `None`.

use boardserver_schemas::ReanimationState;
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Default)]
pub struct TicketStore {
    states: Mutex<HashMap<(String, String), ReanimationState>>,
}

impl TicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `state` and return the ticket that redeems it
    pub fn save(&self, user: &str, state: ReanimationState) -> String {
        let ticket = Uuid::new_v4().to_string();
        self.states
            .lock()
            .insert((user.to_string(), ticket.clone()), state);
        ticket
    }

    /// Redeem a ticket, erasing the entry on hit
    pub fn load(&self, user: &str, ticket: &str) -> Option<ReanimationState> {
        self.states
            .lock()
            .remove(&(user.to_string(), ticket.to_string()))
    }

    /// Number of unredeemed tickets
    pub fn pending(&self) -> usize {
        self.states.lock().len()
    }

    /// Drop every unredeemed ticket
    pub fn clear(&self) {
        self.states.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ticket_is_single_use() {
        let store = TicketStore::new();
        let state = ReanimationState::new(json!({"resumeFrom": ["node-3"]}));

        let ticket = store.save("alice", state.clone());
        assert_eq!(store.load("alice", &ticket), Some(state));
        assert_eq!(store.load("alice", &ticket), None);
        assert_eq!(store.pending(), 0);
    }

    #[test]
    fn test_ticket_is_scoped_to_user() {
        let store = TicketStore::new();
        let ticket = store.save("alice", ReanimationState::new(json!(1)));

        assert_eq!(store.load("bob", &ticket), None);
        assert!(store.load("alice", &ticket).is_some());
    }

    #[test]
    fn test_tickets_are_unique() {
        let store = TicketStore::new();
        let a = store.save("alice", ReanimationState::new(json!(1)));
        let b = store.save("alice", ReanimationState::new(json!(1)));
        assert_ne!(a, b);
        assert_eq!(store.pending(), 2);
    }

    #[test]
    fn test_user_and_ticket_do_not_collide_when_concatenated() {
        let store = TicketStore::new();
        let ticket = store.save("ab", ReanimationState::new(json!("x")));

        // A naive "user + ticket" key would make these equal.
        let shifted_user = format!("ab{}", &ticket[..1]);
        assert_eq!(store.load(&shifted_user, &ticket[1..]), None);
        assert!(store.load("ab", &ticket).is_some());
    }
}
