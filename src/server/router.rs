use std::net::{SocketAddr, SocketAddrV4};

use crate::protocol::{Command, CommandKind, KvRequest};
use crate::ring::HashRing;

/// Where a client key command is executed.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Local,
    /// Relay `request` to `owner`, which answers the client directly.
    Forward {
        owner: SocketAddrV4,
        request: KvRequest,
    },
}

/// Decides between local execution and a one-hop relay to the key's owner.
///
/// Only `PUT`, `GET` and `REMOVE` are routed; everything else runs locally.
pub fn route(
    ring: &HashRing,
    local: SocketAddrV4,
    command: Command,
    request: &KvRequest,
    client: SocketAddr,
) -> Route {
    if command.kind() != CommandKind::Client {
        return Route::Local;
    }
    let Some(owner) = ring.owner_of(&request.key) else {
        return Route::Local;
    };
    if owner == local {
        return Route::Local;
    }
    let Some(relayed) = command.forwarded() else {
        return Route::Local;
    };

    let mut request = request.clone();
    request.command = relayed.tag();
    request.addr = Some(client.to_string());
    Route::Forward { owner, request }
}

/// The client command a `*_FORWARD` tag stands for.
pub fn unforwarded(command: Command) -> Command {
    match command {
        Command::PutForward => Command::Put,
        Command::GetForward => Command::Get,
        Command::RemoveForward => Command::Remove,
        other => other,
    }
}
