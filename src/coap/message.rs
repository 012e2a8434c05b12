//! Typed view of the CoAP messages the registration client exchanges. Wire
//! encoding and decoding are delegated to `coap_lite::Packet`.
use std::fmt;

use coap_lite::{CoapOption as OptionKind, MessageClass, Packet};

use crate::error::ClientError;

const COAP_VERSION: u8 = 1;
const MAX_TOKEN_LEN: usize = 8;

pub(crate) const OPTION_LOCATION_PATH: u16 = 8;
pub(crate) const OPTION_URI_PATH: u16 = 11;
pub(crate) const OPTION_CONTENT_FORMAT: u16 = 12;
pub(crate) const OPTION_URI_QUERY: u16 = 15;

pub(crate) const CONTENT_FORMAT_LINK: u16 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MessageType {
    Confirmable,
    NonConfirmable,
    Acknowledgement,
    Reset,
}

impl From<MessageType> for coap_lite::MessageType {
    fn from(message_type: MessageType) -> Self {
        match message_type {
            MessageType::Confirmable => Self::Confirmable,
            MessageType::NonConfirmable => Self::NonConfirmable,
            MessageType::Acknowledgement => Self::Acknowledgement,
            MessageType::Reset => Self::Reset,
        }
    }
}

impl From<coap_lite::MessageType> for MessageType {
    fn from(message_type: coap_lite::MessageType) -> Self {
        match message_type {
            coap_lite::MessageType::Confirmable => Self::Confirmable,
            coap_lite::MessageType::NonConfirmable => Self::NonConfirmable,
            coap_lite::MessageType::Acknowledgement => Self::Acknowledgement,
            coap_lite::MessageType::Reset => Self::Reset,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Code {
    class: u8,
    detail: u8,
}

impl Code {
    pub(crate) const EMPTY: Self = Self::new(0, 0);
    pub(crate) const POST: Self = Self::new(0, 2);
    pub(crate) const DELETE: Self = Self::new(0, 4);
    pub(crate) const CREATED: Self = Self::new(2, 1);
    pub(crate) const DELETED: Self = Self::new(2, 2);

    pub(crate) const fn new(class: u8, detail: u8) -> Self {
        Self {
            class: class & 0x07,
            detail: detail & 0x1F,
        }
    }

    const fn from_byte(byte: u8) -> Self {
        Self::new(byte >> 5, byte & 0x1F)
    }

    const fn to_byte(self) -> u8 {
        (self.class << 5) | self.detail
    }

    pub(crate) const fn is_empty(self) -> bool {
        self.class == 0 && self.detail == 0
    }

    pub(crate) const fn is_success(self) -> bool {
        self.class == 2
    }

    pub(crate) const fn reason(self) -> &'static str {
        match (self.class, self.detail) {
            (2, 1) => "Created",
            (2, 2) => "Deleted",
            (2, 4) => "Changed",
            (4, 0) => "Bad Request",
            (4, 1) => "Unauthorized",
            (4, 2) => "Bad Option",
            (4, 3) => "Forbidden",
            (4, 4) => "Not Found",
            (4, 5) => "Method Not Allowed",
            (4, 12) => "Precondition Failed",
            (4, 15) => "Unsupported Content-Format",
            (5, 0) => "Internal Server Error",
            (5, 3) => "Service Unavailable",
            (5, 4) => "Gateway Timeout",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.class, self.detail)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MessageOption {
    pub(crate) number: u16,
    pub(crate) value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Message {
    pub(crate) message_type: MessageType,
    pub(crate) code: Code,
    pub(crate) message_id: u16,
    pub(crate) token: Vec<u8>,
    pub(crate) options: Vec<MessageOption>,
    pub(crate) payload: Vec<u8>,
}

impl Message {
    pub(crate) const fn new(
        message_type: MessageType,
        code: Code,
        message_id: u16,
        token: Vec<u8>,
    ) -> Self {
        Self {
            message_type,
            code,
            message_id,
            token,
            options: Vec::new(),
            payload: Vec::new(),
        }
    }

    pub(crate) const fn empty_ack(message_id: u16) -> Self {
        Self::new(MessageType::Acknowledgement, Code::EMPTY, message_id, Vec::new())
    }

    pub(crate) fn push_option(&mut self, number: u16, value: impl Into<Vec<u8>>) {
        self.options.push(MessageOption {
            number,
            value: value.into(),
        });
    }

    pub(crate) fn push_uint_option(&mut self, number: u16, value: u16) {
        let encoded = match value.to_be_bytes() {
            [0, 0] => Vec::new(),
            [0, low] => vec![low],
            [high, low] => vec![high, low],
        };
        self.push_option(number, encoded);
    }

    pub(crate) fn option_values(&self, number: u16) -> impl Iterator<Item = &[u8]> {
        self.options
            .iter()
            .filter(move |option| option.number == number)
            .map(|option| option.value.as_slice())
    }

    pub(crate) fn option_strings(&self, number: u16) -> Vec<String> {
        self.option_values(number)
            .map(|value| String::from_utf8_lossy(value).into_owned())
            .collect()
    }

    /// Serializes the message; options go out in ascending number order.
    ///
    /// # Errors
    ///
    /// Returns an error for tokens over 8 bytes or when the packet cannot be
    /// encoded.
    pub(crate) fn encode(&self) -> Result<Vec<u8>, ClientError> {
        if self.token.len() > MAX_TOKEN_LEN {
            return Err(malformed("token longer than 8 bytes"));
        }
        let mut packet = Packet::new();
        packet.header.set_version(COAP_VERSION);
        packet.header.set_type(self.message_type.into());
        packet.header.code = MessageClass::from(self.code.to_byte());
        packet.header.message_id = self.message_id;
        packet.set_token(self.token.clone());
        for option in &self.options {
            packet.add_option(OptionKind::from(option.number), option.value.clone());
        }
        packet.payload.clone_from(&self.payload);
        packet.to_bytes().map_err(|err| ClientError::Codec {
            reason: err.to_string(),
        })
    }

    /// Parses one datagram.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Codec`] when the datagram is not a CoAP packet
    /// and [`ClientError::Malformed`] for packets this client never accepts.
    pub(crate) fn decode(bytes: &[u8]) -> Result<Self, ClientError> {
        let packet = Packet::from_bytes(bytes).map_err(|err| ClientError::Codec {
            reason: err.to_string(),
        })?;
        if packet.header.get_version() != COAP_VERSION {
            return Err(malformed("unsupported version"));
        }

        let options: Vec<MessageOption> = packet
            .options()
            .flat_map(|(number, values)| {
                values.iter().map(move |value| MessageOption {
                    number: *number,
                    value: value.clone(),
                })
            })
            .collect();
        let token = packet.get_token().to_vec();
        let message_type = MessageType::from(packet.header.get_type());
        let message_id = packet.header.message_id;
        let code = Code::from_byte(u8::from(packet.header.code));
        let payload = packet.payload;

        if code.is_empty() && (!token.is_empty() || !options.is_empty() || !payload.is_empty()) {
            return Err(malformed("empty message with content"));
        }
        let mut message = Self::new(message_type, code, message_id, token);
        message.options = options;
        message.payload = payload;
        Ok(message)
    }
}

const fn malformed(reason: &'static str) -> ClientError {
    ClientError::Malformed { reason }
}
