//! Plain-UDP CoAP transport and the LwM2M registration client built on it.

mod client;
mod lwm2m;
mod message;

#[cfg(test)]
mod tests;

pub use client::{TransmissionParams, UdpClientFactory, UdpRegistrationClient};
