use std::fmt;

/// Every request tag a node understands.
///
/// The numeric values are part of the wire format and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Command {
    Put = 0x01,
    Get = 0x02,
    Remove = 0x03,
    Shutdown = 0x04,
    Wipeout = 0x05,
    IsAlive = 0x06,
    GetPid = 0x07,
    GetMembershipCount = 0x08,
    GetMembershipList = 0x22,

    PutForward = 0x23,
    GetForward = 0x24,
    RemoveForward = 0x25,

    PutReplicateSon = 0x26,
    PutReplicateGrandson = 0x27,
    RemoveReplicateSon = 0x28,
    RemoveReplicateGrandson = 0x29,
    WipeoutReplicateSon = 0x2a,
    WipeoutReplicateGrandson = 0x2b,

    GrandsonDied = 0x30,
    SonDied = 0x31,
    FatherDied = 0x32,
    GrandfatherDied1 = 0x33,
    GrandfatherDied2 = 0x34,
    IAmYourFather = 0x35,
    IAmYourGrandfather = 0x36,
    IAmYourSon = 0x37,
    IAmYourGrandson = 0x38,

    Hello = 0x40,
}

/// Coarse grouping used by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Key commands that are subject to ownership routing.
    Client,
    /// Key commands relayed by a non-owner; executed without re-routing.
    Forwarded,
    /// Write fan-out from an owner to its son or grandson.
    Replicate,
    /// Death notices and resurrection hand-offs.
    Chain,
    /// Everything else: liveness, membership and process control.
    Lifecycle,
}

impl Command {
    pub fn tag(self) -> u32 {
        self as u32
    }

    pub fn kind(self) -> CommandKind {
        use Command::*;
        match self {
            Put | Get | Remove => CommandKind::Client,
            PutForward | GetForward | RemoveForward => CommandKind::Forwarded,
            PutReplicateSon
            | PutReplicateGrandson
            | RemoveReplicateSon
            | RemoveReplicateGrandson
            | WipeoutReplicateSon
            | WipeoutReplicateGrandson => CommandKind::Replicate,
            GrandsonDied | SonDied | FatherDied | GrandfatherDied1 | GrandfatherDied2
            | IAmYourFather | IAmYourGrandfather | IAmYourSon | IAmYourGrandson => {
                CommandKind::Chain
            }
            Shutdown | Wipeout | IsAlive | GetPid | GetMembershipCount | GetMembershipList
            | Hello => CommandKind::Lifecycle,
        }
    }

    /// The tag a non-owner relays this command under, if it can be relayed.
    pub fn forwarded(self) -> Option<Command> {
        match self {
            Command::Get => Some(Command::GetForward),
            Command::Put => Some(Command::PutForward),
            Command::Remove => Some(Command::RemoveForward),
            _ => None,
        }
    }
}

impl TryFrom<u32> for Command {
    type Error = u32;

    fn try_from(tag: u32) -> Result<Self, Self::Error> {
        use Command::*;
        let command = match tag {
            0x01 => Put,
            0x02 => Get,
            0x03 => Remove,
            0x04 => Shutdown,
            0x05 => Wipeout,
            0x06 => IsAlive,
            0x07 => GetPid,
            0x08 => GetMembershipCount,
            0x22 => GetMembershipList,
            0x23 => PutForward,
            0x24 => GetForward,
            0x25 => RemoveForward,
            0x26 => PutReplicateSon,
            0x27 => PutReplicateGrandson,
            0x28 => RemoveReplicateSon,
            0x29 => RemoveReplicateGrandson,
            0x2a => WipeoutReplicateSon,
            0x2b => WipeoutReplicateGrandson,
            0x30 => GrandsonDied,
            0x31 => SonDied,
            0x32 => FatherDied,
            0x33 => GrandfatherDied1,
            0x34 => GrandfatherDied2,
            0x35 => IAmYourFather,
            0x36 => IAmYourGrandfather,
            0x37 => IAmYourSon,
            0x38 => IAmYourGrandson,
            0x40 => Hello,
            other => return Err(other),
        };
        Ok(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}(0x{:02x})", self, self.tag())
    }
}
