use std::time::Duration;

use amlink_transport::{ConnectionSpec, LinkMode, SfConfig};

use crate::error::{RelayError, Result};

/// Default redial period for autoconnecting sides.
pub const DEFAULT_RECONNECT: Duration = Duration::from_secs(10);

/// One side of a relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub spec: ConnectionSpec,
    pub mode: LinkMode,
}

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// The side peers usually connect to.
    pub server: EndpointConfig,
    /// The sides facing motes or upstream forwarders. They share one intake,
    /// and every packet from the server side goes out to each of them.
    pub sources: Vec<EndpointConfig>,
    /// Buffer per intake channel. 0 hands each packet over directly.
    pub intake_capacity: usize,
    /// Tuning for serial-forwarder connections on either side.
    pub sf: SfConfig,
}

impl RelayConfig {
    /// Server side listens and source sides dial, unless flipped.
    ///
    /// `client_client` makes the server side dial too; `server_server` makes
    /// the source sides listen too. Setting both would just swap the ends, so
    /// it is rejected. At least one source is required.
    pub fn new(
        server: ConnectionSpec,
        sources: Vec<ConnectionSpec>,
        reconnect: Duration,
        client_client: bool,
        server_server: bool,
    ) -> Result<Self> {
        if client_client && server_server {
            return Err(RelayError::InvalidConfig(
                "client-client and server-server are mutually exclusive".into(),
            ));
        }
        if sources.is_empty() {
            return Err(RelayError::InvalidConfig("no source connection".into()));
        }

        let server_mode = if client_client {
            LinkMode::Autoconnect(reconnect)
        } else {
            LinkMode::Listen
        };
        let source_mode = if server_server {
            LinkMode::Listen
        } else {
            LinkMode::Autoconnect(reconnect)
        };

        Ok(Self {
            server: EndpointConfig {
                spec: server,
                mode: server_mode,
            },
            sources: sources
                .into_iter()
                .map(|spec| EndpointConfig {
                    spec,
                    mode: source_mode,
                })
                .collect(),
            intake_capacity: 0,
            sf: SfConfig::default(),
        })
    }
}
