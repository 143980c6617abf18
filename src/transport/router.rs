//! Routes raw transport events to the loop that owns them

use super::{Inbound, RawEvent, TickAligner, TrafficSample};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// The receiving loop is gone
#[derive(Debug, Error, PartialEq)]
#[error("{0} loop is no longer accepting input")]
pub struct LoopClosed(pub &'static str);

/// Feeds the sonification and alert loops.
///
/// Notes and amplitudes go through the [`TickAligner`]; triggers pass
/// straight through. Dropping the router closes every channel, which is how
/// the loops learn to shut down.
pub struct Router {
    aligner: TickAligner,
    ticks: mpsc::Sender<TrafficSample>,
    incident_started: mpsc::Sender<()>,
    incident_resolved: mpsc::Sender<()>,
    dropped_triggers: u64,
}

impl Router {
    pub fn new(
        ticks: mpsc::Sender<TrafficSample>,
        incident_started: mpsc::Sender<()>,
        incident_resolved: mpsc::Sender<()>,
    ) -> Self {
        Self {
            aligner: TickAligner::new(),
            ticks,
            incident_started,
            incident_resolved,
            dropped_triggers: 0,
        }
    }

    /// Turn a raw event into an inbound message, pairing ticks as needed
    pub fn accept(&mut self, event: RawEvent) -> Option<Inbound> {
        match event {
            RawEvent::Notes(values) => self.aligner.push_notes(values).map(Inbound::TrafficTick),
            RawEvent::Amplitudes(amps) => self.aligner.push_amplitudes(amps).map(Inbound::TrafficTick),
            RawEvent::IncidentStarted => Some(Inbound::IncidentStarted),
            RawEvent::IncidentResolved => Some(Inbound::IncidentResolved),
        }
    }

    /// Hand an inbound message to its loop.
    ///
    /// Ticks wait for room in the sonification queue. Triggers never wait: a
    /// trigger whose alert loop already has a full queue is dropped and
    /// counted, so a backed-up alert cannot hold up the other loops.
    pub async fn deliver(&mut self, message: Inbound) -> Result<(), LoopClosed> {
        match message {
            Inbound::TrafficTick(sample) => {
                debug!("Tick with {} slots", sample.len());
                self.ticks
                    .send(sample)
                    .await
                    .map_err(|_| LoopClosed("sonification"))
            }
            Inbound::IncidentStarted => {
                let result = self.incident_started.try_send(());
                self.trigger_sent(result, "mitigation")
            }
            Inbound::IncidentResolved => {
                let result = self.incident_resolved.try_send(());
                self.trigger_sent(result, "resolution")
            }
        }
    }

    fn trigger_sent(
        &mut self,
        result: Result<(), TrySendError<()>>,
        loop_name: &'static str,
    ) -> Result<(), LoopClosed> {
        match result {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(())) => {
                self.dropped_triggers += 1;
                warn!("{} queue is full, dropping trigger", loop_name);
                Ok(())
            }
            Err(TrySendError::Closed(())) => Err(LoopClosed(loop_name)),
        }
    }

    /// Accept and deliver in one step
    pub async fn route(&mut self, event: RawEvent) -> Result<(), LoopClosed> {
        match self.accept(event) {
            Some(message) => self.deliver(message).await,
            None => Ok(()),
        }
    }

    /// Stale arrays discarded by the aligner
    pub fn dropped(&self) -> u64 {
        self.aligner.dropped()
    }

    /// Triggers discarded because their alert loop was backed up
    pub fn dropped_triggers(&self) -> u64 {
        self.dropped_triggers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_route_pairs_and_delivers() {
        let (tick_tx, mut tick_rx) = mpsc::channel(4);
        let (start_tx, mut start_rx) = mpsc::channel(4);
        let (end_tx, mut end_rx) = mpsc::channel(4);
        let mut router = Router::new(tick_tx, start_tx, end_tx);

        router.route(RawEvent::Notes(vec![10.0])).await.unwrap();
        assert!(tick_rx.try_recv().is_err());

        router.route(RawEvent::Amplitudes(vec![1.0])).await.unwrap();
        let tick = tick_rx.recv().await.unwrap();
        assert_eq!(tick.slot(0), Some((10.0, 1.0)));

        router.route(RawEvent::IncidentStarted).await.unwrap();
        router.route(RawEvent::IncidentResolved).await.unwrap();
        assert_eq!(start_rx.recv().await, Some(()));
        assert_eq!(end_rx.recv().await, Some(()));
    }

    #[tokio::test]
    async fn test_route_reports_closed_loop() {
        let (tick_tx, tick_rx) = mpsc::channel(1);
        let (start_tx, _start_rx) = mpsc::channel(1);
        let (end_tx, _end_rx) = mpsc::channel(1);
        let mut router = Router::new(tick_tx, start_tx, end_tx);
        drop(tick_rx);

        router.route(RawEvent::Notes(vec![1.0])).await.unwrap();
        let result = router.route(RawEvent::Amplitudes(vec![1.0])).await;
        assert_eq!(result, Err(LoopClosed("sonification")));
    }

    #[tokio::test]
    async fn test_full_trigger_queue_does_not_block_ticks() {
        let (tick_tx, mut tick_rx) = mpsc::channel(4);
        let (start_tx, mut start_rx) = mpsc::channel(1);
        let (end_tx, mut end_rx) = mpsc::channel(1);
        let mut router = Router::new(tick_tx, start_tx, end_tx);

        // nobody drains the mitigation queue, as during a long hold
        router.route(RawEvent::IncidentStarted).await.unwrap();
        router.route(RawEvent::IncidentStarted).await.unwrap();
        router.route(RawEvent::IncidentStarted).await.unwrap();
        assert_eq!(router.dropped_triggers(), 2);

        router.route(RawEvent::IncidentResolved).await.unwrap();
        router.route(RawEvent::Notes(vec![40.0])).await.unwrap();
        router.route(RawEvent::Amplitudes(vec![1.0])).await.unwrap();

        assert!(tick_rx.try_recv().is_ok());
        assert_eq!(end_rx.try_recv(), Ok(()));
        assert_eq!(start_rx.try_recv(), Ok(()));
        assert!(start_rx.try_recv().is_err());
        assert_eq!(router.dropped_triggers(), 2);
    }

    #[tokio::test]
    async fn test_closed_alert_loop_is_reported() {
        let (tick_tx, _tick_rx) = mpsc::channel(1);
        let (start_tx, _start_rx) = mpsc::channel(1);
        let (end_tx, end_rx) = mpsc::channel(1);
        let mut router = Router::new(tick_tx, start_tx, end_tx);
        drop(end_rx);

        let result = router.route(RawEvent::IncidentResolved).await;
        assert_eq!(result, Err(LoopClosed("resolution")));
    }
}
