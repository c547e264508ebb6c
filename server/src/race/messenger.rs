//! Ping-compensated delivery of a message to both racers

use crate::entry_car::EntryCar;
use crate::outbox::{Outbox, OutboxError};
use tokio::time::sleep;

/// Sends `message` to both cars so they receive it at about the same moment.
///
/// The car with the higher round-trip time gets the message first. The other
/// one gets it after waiting out the difference between the two.
pub async fn send_timed(
    outbox: &Outbox,
    message: &str,
    challenger: &EntryCar,
    challenged: &EntryCar,
) -> Result<(), OutboxError> {
    let (high_ping_car, low_ping_car) = if challenger.ping() > challenged.ping() {
        (challenger, challenged)
    } else {
        (challenged, challenger)
    };

    outbox.send_chat(high_ping_car, message)?;
    sleep(high_ping_car.ping().saturating_sub(low_ping_car.ping())).await;
    outbox.send_chat(low_ping_car, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbox::GameMessage;
    use crate::utils::{get_timestamp, MAX_ROUND_TRIP_MS};
    use shared::Packet;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::Instant;
    use tokio_test::{assert_pending, assert_ready_ok, task};

    fn car(session_id: u8, ping_ms: u32) -> EntryCar {
        let addr: SocketAddr = format!("127.0.0.1:{}", 9700 + session_id as u16)
            .parse()
            .unwrap();
        let car = EntryCar::new(session_id, format!("Car {}", session_id), addr);
        car.set_ping(ping_ms);
        car
    }

    fn next_chat(rx: &mut UnboundedReceiver<GameMessage>) -> Option<(SocketAddr, String)> {
        match rx.try_recv().ok()? {
            GameMessage::SendPacket {
                packet: Packet::Chat { message, .. },
                addr,
            } => Some((addr, message)),
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_high_ping_car_first() {
        let (outbox, mut rx) = Outbox::channel();
        let challenger = car(0, 40);
        let challenged = car(1, 120);

        let mut send = task::spawn(send_timed(&outbox, "Ready...", &challenger, &challenged));
        assert_pending!(send.poll());

        assert_eq!(next_chat(&mut rx), Some((challenged.addr, "Ready...".to_string())));
        assert_eq!(next_chat(&mut rx), None);

        tokio::time::sleep(Duration::from_millis(81)).await;
        assert_ready_ok!(send.poll());
        assert_eq!(next_chat(&mut rx), Some((challenger.addr, "Ready...".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_matches_ping_difference() {
        let (outbox, mut rx) = Outbox::channel();
        let challenger = car(0, 250);
        let challenged = car(1, 30);

        let start = Instant::now();
        send_timed(&outbox, "Set...", &challenger, &challenged).await.unwrap();
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_millis(220));
        assert!(elapsed < Duration::from_millis(222));
        assert_eq!(next_chat(&mut rx).map(|(addr, _)| addr), Some(challenger.addr));
        assert_eq!(next_chat(&mut rx).map(|(addr, _)| addr), Some(challenged.addr));
    }

    #[tokio::test(start_paused = true)]
    async fn test_equal_ping_has_no_delay() {
        let (outbox, mut rx) = Outbox::channel();
        let challenger = car(0, 60);
        let challenged = car(1, 60);

        let start = Instant::now();
        send_timed(&outbox, "Go!", &challenger, &challenged).await.unwrap();

        assert!(start.elapsed() < Duration::from_millis(1));
        assert!(next_chat(&mut rx).is_some());
        assert!(next_chat(&mut rx).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnected_car_is_skipped() {
        let (outbox, mut rx) = Outbox::channel();
        let challenger = car(0, 10);
        let challenged = car(1, 90);
        challenged.mark_disconnected();

        send_timed(&outbox, "Go!", &challenger, &challenged).await.unwrap();

        assert_eq!(next_chat(&mut rx).map(|(addr, _)| addr), Some(challenger.addr));
        assert_eq!(next_chat(&mut rx), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inflated_ping_delay_is_bounded() {
        let (outbox, mut rx) = Outbox::channel();
        let challenger = car(0, u32::MAX);
        let challenged = car(1, 30);
        challenger.record_ping_sent(1);
        assert!(challenger.accept_pong(1, get_timestamp()));

        let start = Instant::now();
        send_timed(&outbox, "Go!", &challenger, &challenged).await.unwrap();

        let expected = Duration::from_millis((MAX_ROUND_TRIP_MS - 30) as u64);
        assert!(start.elapsed() >= expected);
        assert!(start.elapsed() < expected + Duration::from_millis(2));
        assert_eq!(next_chat(&mut rx).map(|(addr, _)| addr), Some(challenger.addr));
        assert_eq!(next_chat(&mut rx).map(|(addr, _)| addr), Some(challenged.addr));
    }
}
