//! Integration tests driving `Registry` through multi-step flows, as a
//! real connection handler would, rather than single isolated operations
//! (those are covered by `manager.rs`'s own inline unit tests).

use std::time::Instant;

use pigserver_protocol::{PlayerId, RoomId};
use pigserver_registry::{PlayerState, Registry, RegistryError, RoomState};

fn login(reg: &mut Registry, nick: &str) -> PlayerId {
    let id = reg.add_player(Instant::now()).unwrap();
    reg.set_nickname(id, nick.to_string());
    id
}

/// SPEC_FULL.md §8's round-trip invariant: a session that logs in, lists
/// rooms, joins and leaves a room it never fills, then exits, leaves the
/// registry indistinguishable from its starting state.
#[test]
fn login_join_leave_exit_round_trip_leaves_no_trace() {
    let mut reg = Registry::new(10, 5);
    let alice = login(&mut reg, "alice");
    let _ = reg.list_rooms();
    reg.join_room(RoomId(0), alice).unwrap();
    reg.leave_room(alice).unwrap();
    reg.remove_player(alice);

    assert!(reg.get_player(alice).is_none());
    for room in reg.list_rooms() {
        assert_eq!(room.player_count, 0);
        assert_eq!(room.state, RoomState::Waiting);
    }
}

/// Two players fill a room, the match is reset, and the seats are
/// immediately reusable — mirrors the handler/coordinator teardown
/// sequence (`reset_room_after_game`) after a finished match.
#[test]
fn a_full_room_can_be_played_and_reused() {
    let mut reg = Registry::new(10, 5);
    let alice = login(&mut reg, "alice");
    let bob = login(&mut reg, "bob");

    assert_eq!(reg.join_room(RoomId(0), alice).unwrap(), false);
    assert_eq!(reg.join_room(RoomId(0), bob).unwrap(), true);
    assert_eq!(reg.get_room(RoomId(0)).unwrap().state, RoomState::InProgress);

    // A third player cannot join a full, in-progress room.
    let carol = login(&mut reg, "carol");
    assert!(matches!(reg.join_room(RoomId(0), carol), Err(RegistryError::RoomUnavailable(_))));

    reg.reset_room_after_game(RoomId(0));
    assert_eq!(reg.get_player(alice).unwrap().state, PlayerState::Lobby);
    assert_eq!(reg.get_player(bob).unwrap().state, PlayerState::Lobby);

    // Room 0 is immediately joinable again.
    assert_eq!(reg.join_room(RoomId(0), carol).unwrap(), false);
}

/// The disconnect/reconnect splice a handler performs on `RESUME`: the
/// disconnected identity is found by nickname, reconnected, and the
/// provisional identity created for the new socket is discarded.
#[test]
fn reconnect_splices_the_disconnected_identity_and_drops_the_provisional_one() {
    let mut reg = Registry::new(10, 5);
    let alice = login(&mut reg, "alice");
    let bob = login(&mut reg, "bob");
    reg.join_room(RoomId(0), alice).unwrap();
    reg.join_room(RoomId(0), bob).unwrap();

    reg.handle_disconnect(alice, Instant::now());
    assert_eq!(reg.find_active("alice"), None);
    assert_eq!(reg.find_disconnected("alice"), Some(alice));

    // A fresh socket logs back in under the same nickname.
    let provisional = reg.add_player(Instant::now()).unwrap();
    let resuming = reg.find_disconnected("alice").expect("alice should still be findable");
    assert_eq!(resuming, alice);
    reg.reconnect(resuming, Instant::now()).unwrap();
    reg.remove_player(provisional);

    assert!(reg.get_player(provisional).is_none());
    assert!(reg.get_player(alice).unwrap().connected);
    assert_eq!(reg.get_room(RoomId(0)).unwrap().player_count, 2, "alice's seat was never vacated");
}

/// A nickname collision while the original session is still connected
/// tears the original down first, freeing the nickname for the newcomer,
/// matching scenario S5.
#[test]
fn active_nickname_collision_frees_the_seat_for_the_newcomer() {
    let mut reg = Registry::new(10, 5);
    let alice = login(&mut reg, "alice");

    let active = reg.find_active("alice").expect("alice is connected");
    reg.remove_player(active);

    let new_alice = login(&mut reg, "alice");
    assert_ne!(alice, new_alice);
    assert_eq!(reg.find_active("alice"), Some(new_alice));
}

/// `player_count` always matches the number of occupied slots, across a
/// sequence of joins, a leave, and a reset — SPEC_FULL.md §8's universal
/// invariant.
#[test]
fn player_count_always_matches_occupied_slots() {
    let mut reg = Registry::new(10, 5);
    let alice = login(&mut reg, "alice");
    let bob = login(&mut reg, "bob");

    let check = |reg: &Registry| {
        let room = reg.get_room(RoomId(0)).unwrap();
        let occupied = room.slots.iter().filter(|s| s.is_some()).count();
        assert_eq!(room.player_count, occupied);
    };

    check(&reg);
    reg.join_room(RoomId(0), alice).unwrap();
    check(&reg);
    reg.join_room(RoomId(0), bob).unwrap();
    check(&reg);
    reg.reset_room_after_game(RoomId(0));
    check(&reg);
}
