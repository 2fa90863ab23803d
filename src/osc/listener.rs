//! OSC listener: UDP socket listener on a dedicated thread.

use std::io;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rosc::{decoder, OscPacket};
use tracing::{debug, info, warn};

use super::config::OscConfig;
use super::mapping::{apply_osc_message, OscMapping};
use crate::vm::MachineCore;

/// Active OSC listener running on a background thread.
pub struct OscListener {
    stop_flag: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    port: u16,
}

impl OscListener {
    /// Start listening for OSC messages on a UDP port. Matching messages are
    /// applied straight to `core`.
    pub fn start(config: &OscConfig, core: Arc<MachineCore>) -> io::Result<Self> {
        let addr = format!("127.0.0.1:{}", config.listen_port);
        let socket = UdpSocket::bind(&addr)?;
        // Short timeout so the stop flag is checked periodically.
        socket.set_read_timeout(Some(Duration::from_millis(100)))?;

        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop_clone = stop_flag.clone();
        let mappings = config.mappings.clone();
        let port = config.listen_port;

        let thread = thread::spawn(move || {
            let mut buf = [0u8; 4096];
            while !stop_clone.load(Ordering::Relaxed) {
                match socket.recv_from(&mut buf) {
                    Ok((size, _addr)) => match decoder::decode_udp(&buf[..size]) {
                        Ok((_, packet)) => dispatch(&packet, &mappings, &core),
                        Err(e) => debug!("ignoring malformed OSC packet: {e:?}"),
                    },
                    Err(ref e)
                        if matches!(
                            e.kind(),
                            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                        ) =>
                    {
                        continue;
                    }
                    Err(e) => {
                        warn!("OSC socket error, listener exiting: {e}");
                        break;
                    }
                }
            }
        });

        info!(port, "OSC listener started");
        Ok(Self {
            stop_flag,
            thread: Some(thread),
            port,
        })
    }

    /// Get the listening port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Signal the listener to stop and wait for its thread.
    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for OscListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn dispatch(packet: &OscPacket, mappings: &[OscMapping], core: &MachineCore) {
    match packet {
        OscPacket::Message(msg) => {
            if let Some(event) = apply_osc_message(msg, mappings) {
                debug!(addr = %msg.addr, ?event, "OSC control");
                event.apply(core);
            }
        }
        OscPacket::Bundle(bundle) => {
            for content in &bundle.content {
                dispatch(content, mappings, core);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::dsl::compile;
    use crate::osc::mapping::OscTarget;
    use crate::source::SourceKind;
    use rosc::{encoder, OscMessage, OscType};

    fn core() -> Arc<MachineCore> {
        let (core, _taps) = MachineCore::new(&EngineConfig::default());
        Arc::new(core)
    }

    fn send(port: u16, packet: &OscPacket) {
        let encoded = encoder::encode(packet).unwrap();
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .send_to(&encoded, format!("127.0.0.1:{port}"))
            .unwrap();
    }

    #[test]
    fn start_and_stop() {
        let config = OscConfig {
            listen_port: 19100, // Use a high port to avoid conflicts
            mappings: Vec::new(),
        };
        let mut listener = OscListener::start(&config, core()).unwrap();
        assert_eq!(listener.port(), 19100);
        listener.stop();
    }

    #[test]
    fn message_sets_control() {
        let config = OscConfig {
            listen_port: 19101,
            ..OscConfig::default()
        };
        let core = core();
        core.load(compile("out = slider1").unwrap());
        let mut listener = OscListener::start(&config, Arc::clone(&core)).unwrap();

        send(
            19101,
            &OscPacket::Message(OscMessage {
                addr: "/slider/1".to_string(),
                args: vec![OscType::Float(0.4)],
            }),
        );
        std::thread::sleep(Duration::from_millis(200));

        assert_eq!(
            core.variables()
                .iter()
                .find(|v| v.name == "slider1")
                .map(|v| v.value),
            Some(0.4)
        );
        listener.stop();
    }

    #[test]
    fn bundle_switches_source() {
        let config = OscConfig {
            listen_port: 19102,
            mappings: vec![crate::osc::mapping::OscMapping {
                address_pattern: "/source".to_string(),
                target: OscTarget::Source,
            }],
        };
        let core = core();
        let mut listener = OscListener::start(&config, Arc::clone(&core)).unwrap();

        send(
            19102,
            &OscPacket::Bundle(rosc::OscBundle {
                timetag: rosc::OscTime {
                    seconds: 0,
                    fractional: 1,
                },
                content: vec![OscPacket::Message(OscMessage {
                    addr: "/source".to_string(),
                    args: vec![OscType::String("noise".to_string())],
                })],
            }),
        );
        std::thread::sleep(Duration::from_millis(200));

        assert_eq!(core.source(), SourceKind::Noise);
        listener.stop();
    }

    #[test]
    fn bind_failure_on_used_port() {
        let config = OscConfig {
            listen_port: 19103,
            mappings: Vec::new(),
        };
        let _listener = OscListener::start(&config, core()).unwrap();
        // Same port again must fail.
        assert!(OscListener::start(&config, core()).is_err());
    }
}
