#![cfg(all(unix, feature = "cli"))]

use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use amlink::dispatch::MessageDispatcher;
use amlink::frame::{AmAddr, AmGroup, AmId, Message};
use amlink::transport::{Connection, SfConnection};
use crossbeam_channel::unbounded;

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .map(|addr| addr.port())
        .expect("ephemeral port should be available")
}

struct KillOnDrop(Child);

impl Drop for KillOnDrop {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

#[test]
fn relays_message_between_two_sf_clients() {
    let server_port = free_port();
    let source_port = free_port();

    let _relay = KillOnDrop(
        Command::new(env!("CARGO_BIN_EXE_amrelay"))
            .arg("--log-level")
            .arg("error")
            .arg("--server-server")
            .arg(format!("sf@127.0.0.1:{server_port}"))
            .arg(format!("sf@127.0.0.1:{source_port}"))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("relay should start"),
    );

    let template = Message::new(AmGroup::DEFAULT, AmAddr::from(0x0002u16));
    let dispatcher = Arc::new(MessageDispatcher::new(template.clone()));
    let (tx, rx) = unbounded();
    dispatcher.register_message_receiver(AmId::from(0x3Fu8), tx);

    let sender = SfConnection::new("127.0.0.1", server_port);
    let receiver = SfConnection::new("127.0.0.1", source_port);
    receiver.add_dispatcher(dispatcher);
    sender.autoconnect(Duration::from_millis(100));
    receiver.autoconnect(Duration::from_millis(100));

    let mut msg = template.new_message();
    msg.set_destination(AmAddr::BROADCAST);
    msg.set_type(AmId::from(0x3Fu8));
    msg.set_payload(vec![0xDE, 0xAD]);

    // The relay drops packets while the far side has no peer, so keep sending.
    let deadline = Instant::now() + Duration::from_secs(10);
    let received = loop {
        assert!(Instant::now() < deadline, "message was never relayed");
        let _ = sender.send(&msg);
        if let Ok(got) = rx.recv_timeout(Duration::from_millis(200)) {
            break got;
        }
    };

    assert_eq!(received.am_type(), AmId::from(0x3Fu8));
    assert_eq!(received.destination(), AmAddr::BROADCAST);
    assert_eq!(received.source(), AmAddr::from(0x0002u16));
    assert_eq!(received.payload().as_ref(), &[0xDE, 0xAD]);

    sender.disconnect();
    receiver.disconnect();
}

#[test]
fn conflicting_link_modes_exit_with_usage() {
    let output = Command::new(env!("CARGO_BIN_EXE_amrelay"))
        .arg("--client-client")
        .arg("--server-server")
        .output()
        .expect("relay should run");

    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn serial_endpoint_is_rejected() {
    let output = Command::new(env!("CARGO_BIN_EXE_amrelay"))
        .arg("--log-level")
        .arg("error")
        .arg(format!("sf@127.0.0.1:{}", free_port()))
        .arg("serial@/dev/ttyUSB0:115200")
        .output()
        .expect("relay should run");

    assert_eq!(output.status.code(), Some(64));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unsupported transport"));
}
