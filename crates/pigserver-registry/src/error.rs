use pigserver_protocol::{PlayerId, RoomId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no free player slot (server full)")]
    ServerFull,

    #[error("room {0} does not exist")]
    RoomNotFound(RoomId),

    #[error("room {0} is not accepting joins")]
    RoomUnavailable(RoomId),

    #[error("player {0} is not in a room")]
    NotInRoom(PlayerId),

    #[error("room {0} has a game in progress")]
    GameInProgress(RoomId),

    #[error("player {0} does not exist")]
    PlayerNotFound(PlayerId),
}
