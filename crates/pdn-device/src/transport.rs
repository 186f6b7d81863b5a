//! Peer-to-peer cable protocol
//!
//! Two devices talk over a serial cable, one JSON object per line. The codec
//! is intentionally forgiving on receive: unknown message types and malformed
//! lines are logged and discarded rather than failing the link, because a
//! half-unplugged cable produces plenty of garbage.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use pdn_core::prelude::*;
use pdn_core::Error;

/// Messages exchanged between paired devices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Bounty beacon: advertises the carried game and button inventory
    Fdn { game: u8, buttons: u8 },
    /// Hunter acknowledgment of a beacon
    Fack,
    /// Bounty confirms the link is good and names itself
    ConnectionConfirmed { peer: String },
    /// Hunter names itself back, completing the handshake
    HunterId { peer: String },
    /// Hunter schedules the duel countdown on both devices
    CountdownStart { duration_ms: u64 },
    /// A player pressed after the draw signal
    DuelPress { reaction_ms: u64 },
    /// A player pressed knowing the peer already won the draw
    DuelConcede,
}

pub fn encode_message(message: &Message) -> String {
    // Message serialization cannot fail: no maps, no non-string keys
    serde_json::to_string(message).unwrap_or_default()
}

/// Parse one wire line. Returns `None` for anything unintelligible.
pub fn parse_message(line: &str) -> Option<Message> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(message) => Some(message),
        Err(err) => {
            warn!(line, error = %err, "discarding unparseable wire line");
            None
        }
    }
}

#[derive(Default)]
struct Channel {
    lines: RefCell<VecDeque<String>>,
}

/// One end of a point-to-point serial cable
///
/// `Default` yields a dead link (nothing attached), which is the normal state
/// of a device sitting in a pocket.
pub struct CableLink {
    /// Lines we send land here for the peer to read
    outbound: Rc<Channel>,
    /// Lines the peer sent land here for us to read
    inbound: Rc<Channel>,
    connected: Rc<Cell<bool>>,
}

impl Default for CableLink {
    fn default() -> Self {
        Self {
            outbound: Rc::new(Channel::default()),
            inbound: Rc::new(Channel::default()),
            connected: Rc::new(Cell::new(false)),
        }
    }
}

impl CableLink {
    /// Create both ends of a connected cable
    pub fn pair() -> (CableLink, CableLink) {
        let a_to_b = Rc::new(Channel::default());
        let b_to_a = Rc::new(Channel::default());
        let connected = Rc::new(Cell::new(true));

        let a = CableLink {
            outbound: Rc::clone(&a_to_b),
            inbound: Rc::clone(&b_to_a),
            connected: Rc::clone(&connected),
        };
        let b = CableLink {
            outbound: b_to_a,
            inbound: a_to_b,
            connected,
        };
        (a, b)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.get()
    }

    /// Unplug the cable. Both ends see the disconnect immediately; queued
    /// lines are lost.
    pub fn sever(&self) {
        if self.connected.get() {
            debug!("cable link severed");
        }
        self.connected.set(false);
        self.outbound.lines.borrow_mut().clear();
        self.inbound.lines.borrow_mut().clear();
    }

    pub fn send(&self, message: &Message) -> Result<()> {
        if !self.connected.get() {
            return Err(Error::LinkDown);
        }
        let line = encode_message(message);
        trace!(%line, "tx");
        self.outbound.lines.borrow_mut().push_back(line);
        Ok(())
    }

    /// Read the next parseable message, skipping garbage lines
    pub fn recv(&self) -> Option<Message> {
        if !self.connected.get() {
            return None;
        }
        loop {
            let line = self.inbound.lines.borrow_mut().pop_front()?;
            if let Some(message) = parse_message(&line) {
                trace!(?message, "rx");
                return Some(message);
            }
        }
    }

    /// Inject a raw line into this end's receive queue. Test hook for
    /// exercising the garbage-tolerance path.
    pub fn inject_raw(&self, line: impl Into<String>) {
        self.inbound.lines.borrow_mut().push_back(line.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fdn_beacon() {
        let message = parse_message(r#"{"type":"fdn","game":3,"buttons":5}"#).unwrap();
        assert_eq!(
            message,
            Message::Fdn {
                game: 3,
                buttons: 5
            }
        );
    }

    #[test]
    fn test_parse_fack() {
        assert_eq!(parse_message(r#"{"type":"fack"}"#), Some(Message::Fack));
    }

    #[test]
    fn test_parse_connection_confirmed() {
        let message =
            parse_message(r#"{"type":"connection_confirmed","peer":"b0untyH4x"}"#).unwrap();
        assert_eq!(
            message,
            Message::ConnectionConfirmed {
                peer: "b0untyH4x".into()
            }
        );
    }

    #[test]
    fn test_parse_countdown_start() {
        let message = parse_message(r#"{"type":"countdown_start","duration_ms":3000}"#).unwrap();
        assert_eq!(message, Message::CountdownStart { duration_ms: 3000 });
    }

    #[test]
    fn test_parse_duel_press() {
        let message = parse_message(r#"{"type":"duel_press","reaction_ms":187}"#).unwrap();
        assert_eq!(message, Message::DuelPress { reaction_ms: 187 });
    }

    #[test]
    fn test_unknown_type_is_discarded() {
        assert_eq!(parse_message(r#"{"type":"warp_drive"}"#), None);
    }

    #[test]
    fn test_malformed_line_is_discarded() {
        assert_eq!(parse_message("{{{nope"), None);
        assert_eq!(parse_message(""), None);
        assert_eq!(parse_message("   "), None);
    }

    #[test]
    fn test_encode_round_trips() {
        let original = Message::HunterId {
            peer: "gh0st".into(),
        };
        let line = encode_message(&original);
        assert_eq!(parse_message(&line), Some(original));
    }

    #[test]
    fn test_pair_carries_messages_both_ways() {
        let (a, b) = CableLink::pair();
        a.send(&Message::Fdn {
            game: 0,
            buttons: 0,
        })
        .unwrap();
        b.send(&Message::Fack).unwrap();

        assert_eq!(
            b.recv(),
            Some(Message::Fdn {
                game: 0,
                buttons: 0
            })
        );
        assert_eq!(a.recv(), Some(Message::Fack));
        assert_eq!(a.recv(), None);
    }

    #[test]
    fn test_recv_skips_garbage_lines() {
        let (a, b) = CableLink::pair();
        b.inject_raw("@@corrupted@@");
        a.send(&Message::Fack).unwrap();
        assert_eq!(b.recv(), Some(Message::Fack));
    }

    #[test]
    fn test_sever_kills_both_ends() {
        let (a, b) = CableLink::pair();
        a.send(&Message::Fack).unwrap();
        b.sever();

        assert!(!a.is_connected());
        assert!(!b.is_connected());
        assert!(matches!(a.send(&Message::Fack), Err(Error::LinkDown)));
        assert_eq!(b.recv(), None);
    }

    #[test]
    fn test_default_link_is_dead() {
        let link = CableLink::default();
        assert!(!link.is_connected());
        assert!(matches!(link.send(&Message::Fack), Err(Error::LinkDown)));
        assert_eq!(link.recv(), None);
    }
}
