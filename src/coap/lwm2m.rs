use crate::registration::RegistrationConfig;

use super::message::{
    CONTENT_FORMAT_LINK, Code, Message, MessageType, OPTION_CONTENT_FORMAT, OPTION_LOCATION_PATH,
    OPTION_URI_PATH, OPTION_URI_QUERY,
};

const REGISTRATION_PATH: &str = "rd";

/// `POST /rd?ep=..&lt=..&lwm2m=..&b=..` carrying the object links.
pub(crate) fn register_request(
    config: &RegistrationConfig,
    message_id: u16,
    token: Vec<u8>,
) -> Message {
    let mut request = Message::new(MessageType::Confirmable, Code::POST, message_id, token);
    request.push_option(OPTION_URI_PATH, REGISTRATION_PATH);
    request.push_uint_option(OPTION_CONTENT_FORMAT, CONTENT_FORMAT_LINK);
    request.push_option(OPTION_URI_QUERY, format!("ep={}", config.endpoint));
    request.push_option(OPTION_URI_QUERY, format!("lt={}", config.lifetime_secs));
    request.push_option(OPTION_URI_QUERY, format!("lwm2m={}", config.lwm2m_version));
    request.push_option(OPTION_URI_QUERY, format!("b={}", config.binding.as_str()));
    request.payload = config.link_format().into_bytes();
    request
}

pub(crate) fn deregister_request(location: &[String], message_id: u16, token: Vec<u8>) -> Message {
    let mut request = Message::new(MessageType::Confirmable, Code::DELETE, message_id, token);
    for segment in location {
        request.push_option(OPTION_URI_PATH, segment.as_str());
    }
    request
}

/// Location-Path segments of a `2.01 Created` answer, e.g. `["rd", "5a3f"]`.
pub(crate) fn registration_location(response: &Message) -> Option<Vec<String>> {
    let segments = response.option_strings(OPTION_LOCATION_PATH);
    if segments.is_empty() {
        None
    } else {
        Some(segments)
    }
}

/// Server-assigned registration id: the last location segment.
pub(crate) fn registration_id(location: &[String]) -> Option<&str> {
    location
        .last()
        .map(String::as_str)
        .filter(|id| !id.is_empty())
}
