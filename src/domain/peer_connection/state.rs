use tracing::warn;

use crate::domain::peer_connection::value_object::{
    IceConnectionState, IceGatheringState, PeerConnectionId, PeerConnectionState, SignalingState,
};

/// Result of accepting an ICE connection state reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IceConnectionTransition {
    pub state: IceConnectionState,
    /// Set when the derived connection state moved as well
    pub connection_state: Option<PeerConnectionState>,
    /// Set only the first time closed is reached
    pub terminal: bool,
}

/// Signaling / ICE state of one peer connection.
///
/// The engine is the source of truth: reported states are recorded without checking
/// that they are reachable from the current one.
/// A state equal to the current one is a redelivery and is not a transition.
#[derive(Debug)]
pub struct ConnectionStateMachine {
    id: PeerConnectionId,
    signaling_state: SignalingState,
    ice_gathering_state: IceGatheringState,
    ice_connection_state: IceConnectionState,
    connection_state: PeerConnectionState,
    subscribed: bool,
}

impl ConnectionStateMachine {
    pub fn new(id: PeerConnectionId) -> Self {
        ConnectionStateMachine {
            id,
            signaling_state: SignalingState::default(),
            ice_gathering_state: IceGatheringState::default(),
            ice_connection_state: IceConnectionState::default(),
            connection_state: PeerConnectionState::default(),
            subscribed: true,
        }
    }

    /// False for notifications of other connections and for anything arriving after unsubscription
    pub fn accepts(&self, id: PeerConnectionId) -> bool {
        if id != self.id {
            warn!(
                "peer connection {}: dropped a notification addressed to {}",
                self.id, id
            );
            return false;
        }
        self.subscribed
    }

    pub fn accept_signaling_state(&mut self, state: SignalingState) -> bool {
        if self.signaling_state == state {
            return false;
        }
        self.signaling_state = state;
        true
    }

    pub fn accept_ice_gathering_state(&mut self, state: IceGatheringState) -> bool {
        if self.ice_gathering_state == state {
            return false;
        }
        self.ice_gathering_state = state;
        true
    }

    pub fn accept_ice_connection_state(
        &mut self,
        state: IceConnectionState,
    ) -> Option<IceConnectionTransition> {
        if self.ice_connection_state == state {
            return None;
        }
        self.ice_connection_state = state;

        let derived = PeerConnectionState::from(state);
        let connection_state = if derived != self.connection_state {
            self.connection_state = derived;
            Some(derived)
        } else {
            None
        };

        let terminal = state == IceConnectionState::Closed && self.unsubscribe();

        Some(IceConnectionTransition {
            state,
            connection_state,
            terminal,
        })
    }

    /// Returns true only on the first call
    pub fn unsubscribe(&mut self) -> bool {
        let was_subscribed = self.subscribed;
        self.subscribed = false;
        was_subscribed
    }

    /// Local close. Moves every state to closed without reporting transitions.
    /// Returns false when the connection was already closed.
    pub fn close(&mut self) -> bool {
        let first = self.unsubscribe();
        self.signaling_state = SignalingState::Closed;
        self.ice_connection_state = IceConnectionState::Closed;
        self.connection_state = PeerConnectionState::Closed;
        first
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    pub fn signaling_state(&self) -> SignalingState {
        self.signaling_state
    }

    pub fn ice_gathering_state(&self) -> IceGatheringState {
        self.ice_gathering_state
    }

    pub fn ice_connection_state(&self) -> IceConnectionState {
        self.ice_connection_state
    }

    pub fn connection_state(&self) -> PeerConnectionState {
        self.connection_state
    }
}

#[cfg(test)]
mod test_state_machine {
    use super::*;

    fn machine() -> ConnectionStateMachine {
        ConnectionStateMachine::new(PeerConnectionId::new(7))
    }

    #[test]
    fn initial_states() {
        let machine = machine();

        assert_eq!(machine.signaling_state(), SignalingState::Stable);
        assert_eq!(machine.ice_gathering_state(), IceGatheringState::New);
        assert_eq!(machine.ice_connection_state(), IceConnectionState::New);
        assert_eq!(machine.connection_state(), PeerConnectionState::New);
        assert!(machine.is_subscribed());
    }

    #[test]
    fn accepts_only_own_id() {
        let machine = machine();

        assert!(machine.accepts(PeerConnectionId::new(7)));
        assert!(!machine.accepts(PeerConnectionId::new(8)));
    }

    #[test]
    fn signaling_offer_answer_cycle() {
        let mut machine = machine();

        assert!(machine.accept_signaling_state(SignalingState::HaveLocalOffer));
        assert!(machine.accept_signaling_state(SignalingState::Stable));
        assert!(machine.accept_signaling_state(SignalingState::HaveRemoteOffer));
        assert!(machine.accept_signaling_state(SignalingState::HaveLocalPranswer));
        assert!(machine.accept_signaling_state(SignalingState::Stable));
        assert_eq!(machine.signaling_state(), SignalingState::Stable);
    }

    #[test]
    fn redelivered_state_is_not_a_transition() {
        let mut machine = machine();

        assert!(machine.accept_signaling_state(SignalingState::HaveLocalOffer));
        assert!(!machine.accept_signaling_state(SignalingState::HaveLocalOffer));
        assert!(machine.accept_ice_gathering_state(IceGatheringState::Gathering));
        assert!(!machine.accept_ice_gathering_state(IceGatheringState::Gathering));
        assert!(machine
            .accept_ice_connection_state(IceConnectionState::Checking)
            .is_some());
        assert!(machine
            .accept_ice_connection_state(IceConnectionState::Checking)
            .is_none());
    }

    #[test]
    fn reported_state_is_not_validated() {
        let mut machine = machine();

        // new -> completed skips checking and connected, the engine still wins
        let transition = machine
            .accept_ice_connection_state(IceConnectionState::Completed)
            .unwrap();

        assert_eq!(transition.state, IceConnectionState::Completed);
        assert_eq!(machine.ice_connection_state(), IceConnectionState::Completed);
    }

    #[test]
    fn derived_connection_state() {
        let mut machine = machine();

        let checking = machine
            .accept_ice_connection_state(IceConnectionState::Checking)
            .unwrap();
        assert_eq!(
            checking.connection_state,
            Some(PeerConnectionState::Connecting)
        );

        let connected = machine
            .accept_ice_connection_state(IceConnectionState::Connected)
            .unwrap();
        assert_eq!(
            connected.connection_state,
            Some(PeerConnectionState::Connected)
        );

        // connected -> completed keeps the aggregate state
        let completed = machine
            .accept_ice_connection_state(IceConnectionState::Completed)
            .unwrap();
        assert_eq!(completed.connection_state, None);
    }

    #[test]
    fn disconnected_recovers() {
        let mut machine = machine();
        machine.accept_ice_connection_state(IceConnectionState::Connected);
        machine.accept_ice_connection_state(IceConnectionState::Disconnected);

        let transition = machine
            .accept_ice_connection_state(IceConnectionState::Connected)
            .unwrap();

        assert!(!transition.terminal);
        assert_eq!(machine.connection_state(), PeerConnectionState::Connected);
    }

    #[test]
    fn closed_is_terminal_once() {
        let mut machine = machine();
        machine.accept_ice_connection_state(IceConnectionState::Connected);

        let transition = machine
            .accept_ice_connection_state(IceConnectionState::Closed)
            .unwrap();

        assert!(transition.terminal);
        assert_eq!(transition.connection_state, Some(PeerConnectionState::Closed));
        assert!(!machine.is_subscribed());
        assert!(!machine.accepts(PeerConnectionId::new(7)));
        // second closed is a redelivery
        assert!(machine
            .accept_ice_connection_state(IceConnectionState::Closed)
            .is_none());
    }

    #[test]
    fn local_close() {
        let mut machine = machine();

        assert!(machine.close());
        assert!(!machine.close());

        assert_eq!(machine.signaling_state(), SignalingState::Closed);
        assert_eq!(machine.ice_connection_state(), IceConnectionState::Closed);
        assert_eq!(machine.connection_state(), PeerConnectionState::Closed);
        assert!(!machine.is_subscribed());
    }
}
