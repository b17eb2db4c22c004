//! Values exchanged with the network stack's classification pipeline.

use std::ops::{BitOr, BitOrAssign};

use crate::network::core::PacketSource;

/// Layer a classify or flow-delete call arrives on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Layer {
    AleFlowEstablishedV4,
    AleFlowEstablishedV6,
    StreamV4,
    StreamV6,
    Other(u16),
}

impl Layer {
    /// Stream layer a connection established on this layer is associated with.
    pub fn stream_layer(self) -> Option<Layer> {
        match self {
            Layer::AleFlowEstablishedV4 => Some(Layer::StreamV4),
            Layer::AleFlowEstablishedV6 => Some(Layer::StreamV6),
            _ => None,
        }
    }

    pub fn is_stream(self) -> bool {
        matches!(self, Layer::StreamV4 | Layer::StreamV6)
    }
}

/// Disposition returned to the network stack.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Action {
    Permit,
    Block,
    #[default]
    Continue,
}

macro_rules! flag_set {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
        pub struct $name(u32);

        impl $name {
            pub const fn empty() -> Self {
                Self(0)
            }

            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            pub const fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }

            pub fn insert(&mut self, other: Self) {
                self.0 |= other.0;
            }

            pub fn remove(&mut self, other: Self) {
                self.0 &= !other.0;
            }
        }

        impl BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }
    };
}

flag_set!(
    /// Flags describing a chunk of stream data.
    StreamFlags
);

impl StreamFlags {
    pub const SEND: Self = Self(0x0001);
    pub const SEND_EXPEDITED: Self = Self(0x0002);
    pub const SEND_PUSH: Self = Self(0x0004);
    pub const SEND_DISCONNECT: Self = Self(0x0008);
    pub const SEND_ABORT: Self = Self(0x0010);
    pub const RECEIVE: Self = Self(0x0020);
    pub const RECEIVE_EXPEDITED: Self = Self(0x0040);
    pub const RECEIVE_PUSH: Self = Self(0x0080);
    pub const RECEIVE_DISCONNECT: Self = Self(0x0100);
    pub const RECEIVE_ABORT: Self = Self(0x0200);

    /// Either direction has signalled disconnect.
    pub fn is_disconnect(self) -> bool {
        self.intersects(Self::SEND_DISCONNECT | Self::RECEIVE_DISCONNECT)
    }

    /// Side of the connection the data came from.
    pub fn source(self) -> PacketSource {
        if self.contains(Self::RECEIVE) {
            PacketSource::FromServer
        } else {
            PacketSource::FromClient
        }
    }
}

flag_set!(
    /// Rights granted to a classify call.
    Rights
);

impl Rights {
    /// The callout may set the action.
    pub const ACTION_WRITE: Self = Self(0x0001);
}

flag_set!(
    /// Flags set on the filter that invoked the callout.
    FilterFlags
);

impl FilterFlags {
    /// Callout must clear ACTION_WRITE after deciding.
    pub const CLEAR_ACTION_RIGHT: Self = Self(0x0001);
}

/// Fixed values of a classify call.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct IncomingValues {
    pub layer: Layer,
}

/// Metadata of a classify call.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct IncomingMetadata {
    /// Opaque id of the flow, unique while it is active
    pub flow_handle: u64,
}

/// The filter that matched.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct FilterInfo {
    pub filter_id: u64,
    pub flags: FilterFlags,
}

/// Borrowed view of stream bytes, valid only for one classify call.
#[derive(Debug, Copy, Clone)]
pub struct StreamData<'a> {
    pub flags: StreamFlags,
    pub data: &'a [u8],
}

impl<'a> StreamData<'a> {
    pub fn new(flags: StreamFlags, data: &'a [u8]) -> Self {
        StreamData { flags, data }
    }
}

/// Decision written back by a classify call.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ClassifyOut {
    pub action: Action,
    pub rights: Rights,
}

impl Default for ClassifyOut {
    fn default() -> Self {
        Self {
            action: Action::Continue,
            rights: Rights::ACTION_WRITE,
        }
    }
}

/// Filter change reported to the callout.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NotifyType {
    AddFilter,
    DeleteFilter,
    Other(u32),
}
