//! Decode-once codec for socket messages.
//!
//! - Text frames => batch text, handed on undecoded
//! - Binary frames => same, when they hold UTF-8
//! - Ping/Pong are lifecycle noise; Close ends the socket

use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, PartialEq, Eq)]
pub enum Inbound {
    Frame(String),
    Control,
    Close(Option<String>),
    Undecodable(usize),
}

pub fn decode(msg: Message) -> Inbound {
    match msg {
        Message::Text(s) => Inbound::Frame(s),
        Message::Binary(b) => {
            let len = b.len();
            String::from_utf8(b).map_or(Inbound::Undecodable(len), Inbound::Frame)
        }
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Inbound::Control,
        Message::Close(frame) => Inbound::Close(
            frame
                .map(|f| f.reason.to_string())
                .filter(|r| !r.is_empty()),
        ),
    }
}
