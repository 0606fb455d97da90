use std::time::Duration;

use server::server::{RoomCommand, RoomDirectory, RoomHandle};
use server::socket::{Outgoing, Socket};
use server::storage::StorageBackend;
use system::{Session, Square, SquareData, WsMessage};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);

fn connect(room: &RoomHandle, id: &str) -> (Socket, UnboundedReceiver<Outgoing>) {
    let (tx, rx) = unbounded_channel();
    let socket = room.pool().open(tx);
    room.send(RoomCommand::Connect {
        socket: socket.clone(),
        client_id: id.into(),
    });
    (socket, rx)
}

fn send(room: &RoomHandle, socket: &Socket, message: &WsMessage) {
    room.send(RoomCommand::Message {
        from: socket.id(),
        text: message.to_json().expect(""),
    });
}

/// Reads frames until one matches `pick`, returning everything seen on the way.
async fn wait_for<T>(
    rx: &mut UnboundedReceiver<Outgoing>,
    mut pick: impl FnMut(&WsMessage) -> Option<T>,
) -> (T, Vec<WsMessage>) {
    let mut seen = Vec::new();
    loop {
        let outgoing = timeout(WAIT, rx.recv())
            .await
            .expect("timed out")
            .expect("socket closed");
        if let Outgoing::Text(text) = outgoing {
            let message = WsMessage::from_json(&text).expect("");
            if let Some(found) = pick(&message) {
                return (found, seen);
            }
            seen.push(message);
        }
    }
}

fn square(color: &str) -> SquareData {
    SquareData {
        x: 0.0,
        y: 0.0,
        width: 10.0,
        height: 10.0,
        color: color.into(),
    }
}

#[tokio::test]
async fn it_should_serialize_concurrent_square_adds() {
    let directory = RoomDirectory::new(StorageBackend::memory(), None, "OnlyRoom");
    let room = directory.room("OnlyRoom");
    let clients = (0..8)
        .map(|i| connect(&room, &i.to_string()))
        .collect::<Vec<_>>();

    let mut tasks = Vec::new();
    for (socket, _) in &clients {
        let room = room.clone();
        let socket = socket.clone();
        tasks.push(tokio::spawn(async move {
            let message = WsMessage::AddSquare {
                id: String::new(),
                square: square("red"),
                square_id: None,
            };
            send(&room, &socket, &message);
        }));
    }
    for task in tasks {
        task.await.expect("");
    }

    let (observer, mut rx) = clients.into_iter().next().expect("");
    send(&room, &observer, &WsMessage::GetSquares);
    let (squares, seen) = wait_for(&mut rx, |message| match message {
        WsMessage::GetSquaresResponse { squares } => Some(squares.clone()),
        _ => None,
    })
    .await;

    let announced = seen
        .iter()
        .filter_map(|message| match message {
            WsMessage::AddSquare { square_id, .. } => *square_id,
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(announced.len(), 8);
    assert!(announced.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(
        squares.iter().map(|square| square.id).collect::<Vec<_>>(),
        announced
    );
}

#[tokio::test]
async fn it_should_wake_up_with_sessions_and_squares_after_hibernating() {
    let directory = RoomDirectory::new(
        StorageBackend::memory(),
        Some(Duration::from_millis(50)),
        "OnlyRoom",
    );
    let room = directory.room("OnlyRoom");
    let (a, _a_rx) = connect(&room, "A");
    let (b, mut b_rx) = connect(&room, "B");

    send(
        &room,
        &a,
        &WsMessage::Move {
            id: "A".into(),
            x: 5.0,
            y: 7.0,
        },
    );
    send(
        &room,
        &a,
        &WsMessage::AddSquare {
            id: "A".into(),
            square: square("blue"),
            square_id: None,
        },
    );
    wait_for(&mut b_rx, |message| match message {
        WsMessage::AddSquare { .. } => Some(()),
        _ => None,
    })
    .await;

    tokio::time::delay_for(Duration::from_millis(300)).await;
    assert!(!room.is_awake());

    send(&room, &b, &WsMessage::GetCursors);
    let (mut sessions, _) = wait_for(&mut b_rx, |message| match message {
        WsMessage::GetCursorsResponse { sessions } => Some(sessions.clone()),
        _ => None,
    })
    .await;
    assert!(room.is_awake());
    sessions.sort_by(|l, r| l.id.cmp(&r.id));
    assert_eq!(
        sessions,
        vec![
            Session {
                id: "A".into(),
                x: 5.0,
                y: 7.0
            },
            Session::new("B".into()),
        ]
    );

    send(&room, &b, &WsMessage::GetSquares);
    let (squares, _) = wait_for(&mut b_rx, |message| match message {
        WsMessage::GetSquaresResponse { squares } => Some(squares.clone()),
        _ => None,
    })
    .await;
    assert_eq!(squares, vec![Square::new(0, square("blue"))]);
}

#[tokio::test]
async fn it_should_keep_rooms_independent() {
    let directory = RoomDirectory::new(StorageBackend::memory(), None, "OnlyRoom");
    let first = directory.room("first");
    let second = directory.room("second");

    let (a, mut a_rx) = connect(&first, "A");
    let (b, mut b_rx) = connect(&second, "B");
    send(
        &first,
        &a,
        &WsMessage::AddSquare {
            id: "A".into(),
            square: square("green"),
            square_id: None,
        },
    );
    wait_for(&mut a_rx, |message| match message {
        WsMessage::AddSquare { .. } => Some(()),
        _ => None,
    })
    .await;

    let (_c, mut c_rx) = connect(&second, "C");
    let (_, seen_by_b) = wait_for(&mut b_rx, |message| match message {
        WsMessage::Join { id } if id == "C" => Some(()),
        _ => None,
    })
    .await;
    assert!(seen_by_b.is_empty());

    send(&second, &b, &WsMessage::GetSquares);
    let (squares, _) = wait_for(&mut b_rx, |message| match message {
        WsMessage::GetSquaresResponse { squares } => Some(squares.clone()),
        _ => None,
    })
    .await;
    assert!(squares.is_empty());
    assert!(c_rx.try_recv().is_err());
}

#[tokio::test]
async fn it_should_drop_rooms_once_idle_and_empty() {
    let directory = RoomDirectory::new(
        StorageBackend::memory(),
        Some(Duration::from_millis(50)),
        "OnlyRoom",
    );
    let room = directory.room("gone");
    let held = directory.room("held");
    let (a, mut a_rx) = connect(&room, "A");
    send(
        &room,
        &a,
        &WsMessage::AddSquare {
            id: "A".into(),
            square: square("red"),
            square_id: None,
        },
    );
    wait_for(&mut a_rx, |message| match message {
        WsMessage::AddSquare { .. } => Some(()),
        _ => None,
    })
    .await;

    // asleep but still connected, and "held" is still referenced
    tokio::time::delay_for(Duration::from_millis(300)).await;
    assert!(!room.is_awake());
    assert_eq!(directory.evict_idle(), 0);
    assert_eq!(directory.len(), 2);

    room.send(RoomCommand::Disconnect { from: a.id() });
    loop {
        match timeout(WAIT, a_rx.recv()).await.expect("timed out") {
            Some(Outgoing::Close) | None => break,
            Some(Outgoing::Text(_)) => (),
        }
    }
    drop(room);
    tokio::time::delay_for(Duration::from_millis(300)).await;
    assert_eq!(directory.evict_idle(), 1);
    assert_eq!(directory.len(), 1);
    drop(held);
    assert_eq!(directory.evict_idle(), 1);
    assert!(directory.is_empty());

    let room = directory.room("gone");
    let (b, mut b_rx) = connect(&room, "B");
    send(&room, &b, &WsMessage::GetSquares);
    let (squares, _) = wait_for(&mut b_rx, |message| match message {
        WsMessage::GetSquaresResponse { squares } => Some(squares.clone()),
        _ => None,
    })
    .await;
    assert_eq!(squares, vec![Square::new(0, square("red"))]);
}
