//! OSC over UDP
//!
//! The traffic producer sends `/note` and `/amp` messages whose numeric
//! arguments are one reading per instrument slot. Incident buttons send a
//! message on press (argument 1.0 or no argument) and, on some controllers,
//! another on release (argument 0.0), which is ignored.

use super::{DecodeError, RawEvent, Router};
use anyhow::{Context, Result};
use rosc::{OscMessage, OscPacket, OscType};
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Addresses the listener reacts to
#[derive(Debug, Clone, PartialEq)]
pub struct OscRoutes {
    pub note: String,
    pub amp: String,
    pub incident_started: String,
    pub incident_resolved: String,
}

impl Default for OscRoutes {
    fn default() -> Self {
        Self {
            note: "/note".to_string(),
            amp: "/amp".to_string(),
            incident_started: "/2/buttonListener".to_string(),
            incident_resolved: "/1/buttonListener".to_string(),
        }
    }
}

fn push_numbers(args: &[OscType], out: &mut Vec<f64>, address: &str) -> Result<(), DecodeError> {
    for arg in args {
        let value = match arg {
            OscType::Int(v) => *v as f64,
            OscType::Long(v) => *v as f64,
            OscType::Float(v) => *v as f64,
            OscType::Double(v) => *v,
            OscType::Bool(v) => f64::from(u8::from(*v)),
            OscType::Array(array) => {
                push_numbers(&array.content, out, address)?;
                continue;
            }
            _ => {
                return Err(DecodeError::NonNumeric {
                    address: address.to_string(),
                    index: out.len(),
                })
            }
        };
        out.push(value);
    }
    Ok(())
}

fn numeric_args(msg: &OscMessage) -> Result<Vec<f64>, DecodeError> {
    let mut out = Vec::with_capacity(msg.args.len());
    push_numbers(&msg.args, &mut out, &msg.addr)?;
    Ok(out)
}

/// A button release carries a single numeric zero
fn is_release(msg: &OscMessage) -> bool {
    match msg.args.first() {
        Some(OscType::Float(v)) => *v == 0.0,
        Some(OscType::Double(v)) => *v == 0.0,
        Some(OscType::Int(v)) => *v == 0,
        Some(OscType::Long(v)) => *v == 0,
        Some(OscType::Bool(v)) => !*v,
        _ => false,
    }
}

fn decode_message(msg: &OscMessage, routes: &OscRoutes, out: &mut Vec<RawEvent>) -> Result<(), DecodeError> {
    let addr = msg.addr.as_str();

    if addr == routes.note {
        out.push(RawEvent::Notes(numeric_args(msg)?));
    } else if addr == routes.amp {
        out.push(RawEvent::Amplitudes(numeric_args(msg)?));
    } else if addr == routes.incident_started || addr == routes.incident_resolved {
        if is_release(msg) {
            debug!("Ignoring button release on {}", addr);
        } else if addr == routes.incident_started {
            out.push(RawEvent::IncidentStarted);
        } else {
            out.push(RawEvent::IncidentResolved);
        }
    } else {
        debug!("Unknown OSC address: {}", addr);
    }

    Ok(())
}

/// Decode a packet into raw events. Bundles are flattened in order.
pub fn decode_packet(packet: &OscPacket, routes: &OscRoutes) -> Result<Vec<RawEvent>, DecodeError> {
    fn walk(packet: &OscPacket, routes: &OscRoutes, out: &mut Vec<RawEvent>) -> Result<(), DecodeError> {
        match packet {
            OscPacket::Message(msg) => decode_message(msg, routes, out),
            OscPacket::Bundle(bundle) => {
                for content in &bundle.content {
                    walk(content, routes, out)?;
                }
                Ok(())
            }
        }
    }

    let mut out = Vec::new();
    walk(packet, routes, &mut out)?;
    Ok(out)
}

/// Decode a UDP datagram
pub fn decode_datagram(bytes: &[u8], routes: &OscRoutes) -> Result<Vec<RawEvent>, DecodeError> {
    let (_rest, packet) =
        rosc::decoder::decode_udp(bytes).map_err(|e| DecodeError::Malformed(e.to_string()))?;
    decode_packet(&packet, routes)
}

/// Encode a button-press message for `address`
pub fn encode_trigger(address: &str) -> Result<Vec<u8>, DecodeError> {
    let packet = OscPacket::Message(OscMessage {
        addr: address.to_string(),
        args: vec![OscType::Float(1.0)],
    });
    rosc::encoder::encode(&packet).map_err(|e| DecodeError::Malformed(e.to_string()))
}

/// Listens for OSC datagrams and feeds them to a [`Router`]
pub struct OscListener {
    socket: UdpSocket,
    routes: OscRoutes,
}

impl OscListener {
    pub async fn bind(addr: &str, routes: OscRoutes) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .with_context(|| format!("failed to bind OSC listener on {}", addr))?;
        Ok(Self { socket, routes })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive until `shutdown` flips to true or a loop stops accepting input.
    ///
    /// The router is dropped on return, closing the loops' channels.
    pub async fn run(self, mut router: Router, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!("OSC listener on {}", self.local_addr()?);

        let mut buf = vec![0u8; 65536];

        while !*shutdown.borrow() {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                received = self.socket.recv_from(&mut buf) => {
                    let (size, peer) = match received {
                        Ok(r) => r,
                        Err(e) => {
                            warn!("Socket error: {}", e);
                            continue;
                        }
                    };

                    let events = match decode_datagram(&buf[..size], &self.routes) {
                        Ok(events) => events,
                        Err(e) => {
                            warn!("Dropping datagram from {}: {}", peer, e);
                            continue;
                        }
                    };

                    for event in events {
                        if let Err(e) = router.route(event).await {
                            info!("{}; OSC listener stopping", e);
                            return Ok(());
                        }
                    }
                }
            }
        }

        info!("OSC listener stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosc::OscBundle;
    use rosc::OscTime;
    use tokio::sync::mpsc;

    fn message(addr: &str, args: Vec<OscType>) -> OscPacket {
        OscPacket::Message(OscMessage {
            addr: addr.to_string(),
            args,
        })
    }

    #[test]
    fn test_decode_notes_and_amps() {
        let routes = OscRoutes::default();

        let notes = message("/note", vec![OscType::Float(12.5), OscType::Int(80), OscType::Double(0.0)]);
        assert_eq!(
            decode_packet(&notes, &routes).unwrap(),
            vec![RawEvent::Notes(vec![12.5, 80.0, 0.0])]
        );

        let amps = message("/amp", vec![OscType::Float(0.1), OscType::Long(1)]);
        assert_eq!(
            decode_packet(&amps, &routes).unwrap(),
            vec![RawEvent::Amplitudes(vec![0.1f32 as f64, 1.0])]
        );
    }

    #[test]
    fn test_decode_rejects_non_numeric() {
        let routes = OscRoutes::default();
        let packet = message("/note", vec![OscType::Int(1), OscType::String("x".into())]);
        assert_eq!(
            decode_packet(&packet, &routes),
            Err(DecodeError::NonNumeric {
                address: "/note".to_string(),
                index: 1
            })
        );
    }

    #[test]
    fn test_decode_triggers_and_releases() {
        let routes = OscRoutes::default();

        let press = message("/2/buttonListener", vec![OscType::Float(1.0)]);
        assert_eq!(decode_packet(&press, &routes).unwrap(), vec![RawEvent::IncidentStarted]);

        let bare = message("/1/buttonListener", vec![]);
        assert_eq!(decode_packet(&bare, &routes).unwrap(), vec![RawEvent::IncidentResolved]);

        let release = message("/2/buttonListener", vec![OscType::Float(0.0)]);
        assert!(decode_packet(&release, &routes).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_address_is_ignored() {
        let routes = OscRoutes::default();
        let packet = message("/cpu", vec![OscType::Float(1.0)]);
        assert!(decode_packet(&packet, &routes).unwrap().is_empty());
    }

    #[test]
    fn test_bundle_is_flattened_in_order() {
        let routes = OscRoutes::default();
        let bundle = OscPacket::Bundle(OscBundle {
            timetag: OscTime { seconds: 0, fractional: 1 },
            content: vec![
                message("/note", vec![OscType::Int(50)]),
                message("/amp", vec![OscType::Int(1)]),
            ],
        });
        assert_eq!(
            decode_packet(&bundle, &routes).unwrap(),
            vec![RawEvent::Notes(vec![50.0]), RawEvent::Amplitudes(vec![1.0])]
        );
    }

    #[test]
    fn test_trigger_round_trips_through_decoder() {
        let routes = OscRoutes::default();
        let bytes = encode_trigger(&routes.incident_started).unwrap();
        assert_eq!(decode_datagram(&bytes, &routes).unwrap(), vec![RawEvent::IncidentStarted]);
    }

    #[test]
    fn test_garbage_datagram_is_malformed() {
        let routes = OscRoutes::default();
        assert!(matches!(
            decode_datagram(b"not osc", &routes),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_listener_routes_datagrams() {
        let listener = OscListener::bind("127.0.0.1:0", OscRoutes::default()).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (tick_tx, mut tick_rx) = mpsc::channel(4);
        let (start_tx, mut start_rx) = mpsc::channel(4);
        let (end_tx, _end_rx) = mpsc::channel(4);
        let router = Router::new(tick_tx, start_tx, end_tx);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(listener.run(router, shutdown_rx));

        let sender = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        for packet in [
            message("/note", vec![OscType::Float(50.0)]),
            message("/amp", vec![OscType::Float(1.0)]),
            message("/2/buttonListener", vec![OscType::Float(1.0)]),
        ] {
            let bytes = rosc::encoder::encode(&packet).unwrap();
            sender.send_to(&bytes, addr).unwrap();
        }

        let tick = tokio::time::timeout(std::time::Duration::from_secs(2), tick_rx.recv())
            .await
            .expect("timeout")
            .expect("closed");
        assert_eq!(tick.slot(0), Some((50.0, 1.0)));

        let trigger = tokio::time::timeout(std::time::Duration::from_secs(2), start_rx.recv())
            .await
            .expect("timeout");
        assert_eq!(trigger, Some(()));

        shutdown_tx.send(true).unwrap();
        task.await.unwrap().unwrap();

        // router dropped with the listener, so the loops see their channels close
        assert!(tick_rx.recv().await.is_none());
    }
}
