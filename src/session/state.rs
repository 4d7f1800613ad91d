use super::*;

/// Connection lifecycle: subscribe, then authorize, then receive jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum State {
    #[display("connected")]
    Connected,
    #[display("subscribed")]
    Subscribed,
    #[display("authenticated")]
    Authenticated,
    #[display("active")]
    Active,
}

impl State {
    pub(crate) fn subscribe(&mut self) -> bool {
        match self {
            State::Connected => {
                *self = State::Subscribed;
                true
            }
            _ => false,
        }
    }

    /// Miners may authorize more than one worker on a connection.
    pub(crate) fn authenticate(&mut self) -> bool {
        match self {
            State::Subscribed => {
                *self = State::Authenticated;
                true
            }
            State::Authenticated | State::Active => true,
            State::Connected => false,
        }
    }

    pub(crate) fn activate(&mut self) -> bool {
        match self {
            State::Authenticated | State::Active => {
                *self = State::Active;
                true
            }
            _ => false,
        }
    }

    pub fn is_subscribed(self) -> bool {
        self != State::Connected
    }

    pub fn is_authorized(self) -> bool {
        matches!(self, State::Authenticated | State::Active)
    }
}
