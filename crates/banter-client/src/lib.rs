pub mod dispatch;
pub mod presence;
pub mod protocol;
pub mod room;
pub mod socket;
pub mod typing;

pub use dispatch::{ListenerSet, Subscription};
pub use presence::{PresenceChannel, PresenceConfig};
pub use protocol::{ClientFrame, EventKind};
pub use room::{RoomChannel, RoomConfig};
pub use socket::{ConnectionState, SocketClient, SocketConfig, SocketEvent};
pub use typing::DEFAULT_TYPING_DELAY;
