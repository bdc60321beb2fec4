//! Service entries — one discovered (protocol, port, application) fact per host.

use serde::{Deserialize, Serialize};

/// Transport protocol number as seen on the wire (6 = TCP, 17 = UDP, ...).
pub type Protocol = u16;

pub type Port = u16;

/// Application identifier handed out by the protocol registry.
pub type AppId = i16;

/// Id the registry returns for names it cannot (or will not) register.
pub const UNKNOWN_APP_ID: AppId = 0;

/// A service observed on a host.
///
/// Immutable once built. Within one host, `(protocol, port)` identifies the
/// entry; the application id is whatever was recorded first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceEntry {
    protocol: Protocol,
    port: Port,
    app_id: AppId,
}

impl ServiceEntry {
    pub const fn new(protocol: Protocol, port: Port, app_id: AppId) -> Self {
        Self {
            protocol,
            port,
            app_id,
        }
    }

    pub const fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub const fn port(&self) -> Port {
        self.port
    }

    pub const fn app_id(&self) -> AppId {
        self.app_id
    }

    /// The `(protocol, port)` pair a host indexes this entry by.
    pub const fn slot(&self) -> (Protocol, Port) {
        (self.protocol, self.port)
    }
}
