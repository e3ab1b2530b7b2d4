//! Application data, loss and record layer extensions after the handshake.

mod dtls_common;

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use dgramtls::crypto::rust_crypto::default_provider;
use dgramtls::types::{HeartbeatMode, MaxFragmentLength};
use dgramtls::{
    DatagramReceiver, DatagramTransport, Delivery, DtlsServerProtocol, DtlsVerifier, Error,
};
use dtls_common::*;

fn ecdhe_pair(pipe: &Pipe) -> (dgramtls::DtlsTransport, dgramtls::DtlsTransport) {
    let (c, s) = handshake(
        pipe,
        config().build().unwrap(),
        Arc::new(TestClient::new()),
        config().build().unwrap(),
        Arc::new(TestServer::new(certificate("server"))),
    );
    (c.expect("client"), s.expect("server"))
}

/// Record the content types of everything `transport` sends.
fn watch(transport: &dgramtls::MemoryTransport, cid_len: usize) -> Arc<Mutex<Vec<u8>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    transport.set_filter(move |datagram| {
        sink.lock().unwrap().extend(record_types(datagram, cid_len));
        Delivery::Deliver
    });
    seen
}

#[test]
fn lost_flights_are_retransmitted() {
    let _ = env_logger::try_init();

    let pipe = Pipe::new(MTU);

    // Lose the first datagram each side sends.
    let client_sent = Arc::new(Mutex::new(Vec::<Vec<u8>>::new()));
    let log = client_sent.clone();
    pipe.client.set_filter(move |datagram| {
        let mut log = log.lock().unwrap();
        log.push(datagram.to_vec());
        if log.len() == 1 {
            Delivery::Drop
        } else {
            Delivery::Deliver
        }
    });
    let mut server_count = 0;
    pipe.server.set_filter(move |_| {
        server_count += 1;
        if server_count == 1 {
            Delivery::Drop
        } else {
            Delivery::Deliver
        }
    });

    let (c, s) = ecdhe_pair(&pipe);
    pipe.client.clear_filter();
    pipe.server.clear_filter();

    let hellos = client_sent
        .lock()
        .unwrap()
        .iter()
        .filter(|d| handshake_types(d).first() == Some(&1))
        .count();
    assert!(hellos >= 2, "ClientHello sent {} times", hellos);

    assert_delivers(&c, &s, b"after loss");
    assert_delivers(&s, &c, b"after loss too");
}

#[test]
fn duplicated_flights_are_harmless() {
    let _ = env_logger::try_init();

    let pipe = Pipe::new(MTU);
    pipe.client.set_filter(|_| Delivery::Duplicate);
    pipe.server.set_filter(|_| Delivery::Duplicate);

    let (c, s) = ecdhe_pair(&pipe);
    assert_delivers(&c, &s, b"one");
    assert_delivers(&s, &c, b"two");
}

#[test]
fn replayed_records_are_dropped() {
    let _ = env_logger::try_init();

    let pipe = Pipe::new(MTU);
    let (c, s) = ecdhe_pair(&pipe);

    pipe.client.set_filter(|_| Delivery::Duplicate);
    assert_delivers(&c, &s, b"once");

    let mut buf = vec![0; s.receive_limit()];
    assert!(matches!(s.receive(&mut buf, 100), Ok(None)));
}

#[test]
fn small_mtu_fragments_handshake() {
    let _ = env_logger::try_init();

    let pipe = Pipe::new(256);
    let (c, s) = ecdhe_pair(&pipe);

    assert!(c.send_limit() < 256);
    let payload = vec![0x5a; c.send_limit()];
    assert_delivers(&c, &s, &payload);
    assert!(c.send(&vec![0; c.send_limit() + 1]).is_err());
}

#[test]
fn max_fragment_length_limits_records() {
    let _ = env_logger::try_init();

    let pipe = Pipe::new(MTU);
    let (c, s) = handshake(
        &pipe,
        config()
            .max_fragment_length(MaxFragmentLength::Pow2_9)
            .build()
            .unwrap(),
        Arc::new(TestClient::new()),
        config().build().unwrap(),
        Arc::new(TestServer::new(certificate("server"))),
    );
    let (c, s) = (c.unwrap(), s.unwrap());

    assert_eq!(c.send_limit(), 512);
    assert_eq!(s.send_limit(), 512);
    assert_eq!(s.receive_limit(), 512);
    assert_delivers(&c, &s, &[1; 512]);
    assert!(c.send(&[1; 513]).is_err());
}

#[test]
fn connection_id_records() {
    let _ = env_logger::try_init();

    let pipe = Pipe::new(MTU);
    let (c, s) = handshake(
        &pipe,
        config().connection_id(vec![1, 2, 3, 4]).build().unwrap(),
        Arc::new(TestClient::new()),
        config().connection_id(vec![9, 8, 7, 6]).build().unwrap(),
        Arc::new(TestServer::new(certificate("server"))),
    );
    let (c, s) = (c.unwrap(), s.unwrap());

    let client_types = watch(&pipe.client, 4);
    let server_types = watch(&pipe.server, 4);
    assert_delivers(&c, &s, b"cid ping");
    assert_delivers(&s, &c, b"cid pong");

    assert_eq!(*client_types.lock().unwrap(), vec![TLS12_CID]);
    assert_eq!(*server_types.lock().unwrap(), vec![TLS12_CID]);
}

#[test]
fn one_sided_connection_id_is_not_used() {
    let _ = env_logger::try_init();

    let pipe = Pipe::new(MTU);
    let (c, s) = handshake(
        &pipe,
        config().connection_id(vec![1, 2, 3, 4]).build().unwrap(),
        Arc::new(TestClient::new()),
        config().build().unwrap(),
        Arc::new(TestServer::new(certificate("server"))),
    );
    let (c, s) = (c.unwrap(), s.unwrap());

    let client_types = watch(&pipe.client, 0);
    assert_delivers(&c, &s, b"plain");
    assert_eq!(*client_types.lock().unwrap(), vec![APPLICATION_DATA]);
}

#[test]
fn heartbeats_are_answered() {
    let _ = env_logger::try_init();

    let pipe = Pipe::new(MTU);
    let (c, s) = handshake(
        &pipe,
        config()
            .heartbeat_policy(HeartbeatMode::PeerAllowedToSend)
            .build()
            .unwrap(),
        Arc::new(TestClient::new()),
        config()
            .heartbeat_policy(HeartbeatMode::PeerNotAllowedToSend)
            .heartbeat_interval(Duration::from_millis(50))
            .build()
            .unwrap(),
        Arc::new(TestServer::new(certificate("server"))),
    );
    let (c, s) = (c.unwrap(), s.unwrap());

    let client_types = watch(&pipe.client, 0);
    let server_types = watch(&pipe.server, 0);

    let server_side = thread::spawn(move || {
        let mut buf = vec![0; s.receive_limit()];
        let result = s.receive(&mut buf, 400).map(|n| n.is_none());
        (s, result)
    });
    let mut buf = vec![0; c.receive_limit()];
    assert!(matches!(c.receive(&mut buf, 400), Ok(None)));
    let (s, server_result) = server_side.join().unwrap();
    assert!(server_result.expect("server receive"));

    let requests = server_types.lock().unwrap().iter().filter(|t| **t == HEARTBEAT).count();
    let responses = client_types.lock().unwrap().iter().filter(|t| **t == HEARTBEAT).count();
    assert!(requests >= 1, "server sent no heartbeat");
    assert!(responses >= 1, "client did not answer");

    assert_delivers(&c, &s, b"still alive");
}

#[test]
fn close_notify_ends_connection() {
    let _ = env_logger::try_init();

    let pipe = Pipe::new(MTU);
    let (c, s) = ecdhe_pair(&pipe);

    let client_types = watch(&pipe.client, 0);
    c.close();
    assert!(c.is_closed());
    assert!(pipe.client.is_closed());
    assert_eq!(*client_types.lock().unwrap(), vec![ALERT]);
    assert!(matches!(c.send(b"late"), Err(Error::Closed)));

    let mut buf = vec![0; s.receive_limit()];
    assert!(matches!(s.receive(&mut buf, 1000), Err(Error::Closed)));
    assert!(s.is_closed());
}

#[test]
fn inline_cookie_exchange() {
    let _ = env_logger::try_init();

    let pipe = Pipe::new(MTU);
    let server_handshake_types = Arc::new(Mutex::new(Vec::new()));
    let sink = server_handshake_types.clone();
    pipe.server.set_filter(move |datagram| {
        sink.lock().unwrap().extend(handshake_types(datagram));
        Delivery::Deliver
    });

    let (c, s) = handshake(
        &pipe,
        config().build().unwrap(),
        Arc::new(TestClient::new()),
        config().verify_requests(true).build().unwrap(),
        Arc::new(TestServer::new(certificate("server"))),
    );
    let (c, s) = (c.expect("client"), s.expect("server"));

    let types = server_handshake_types.lock().unwrap().clone();
    assert_eq!(types.first(), Some(&3), "HelloVerifyRequest first, got {:?}", types);
    assert_eq!(types.iter().filter(|t| **t == 3).count(), 1);
    assert!(types.contains(&2));

    assert_delivers(&c, &s, b"verified");
}

#[test]
fn explicit_verifier_hands_request_to_server() {
    let _ = env_logger::try_init();

    let pipe = Pipe::new(MTU);
    let server_end = pipe.server.clone();
    let server = thread::spawn(move || {
        let verifier = DtlsVerifier::new(&default_provider()).unwrap();
        let mut buf = vec![0; server_end.receive_limit()];
        let mut hello_verify_requests = 0;
        let request = loop {
            let n = server_end
                .receive(&mut buf, 2000)
                .unwrap()
                .expect("ClientHello");
            match verifier.verify_request(b"198.51.100.7:4433", &buf[..n], &*server_end) {
                Some(request) => break request,
                None => hello_verify_requests += 1,
            }
        };
        assert_eq!(hello_verify_requests, 1);
        assert_eq!(request.message_seq(), 1);
        assert!(!request.client_hello().cookie.is_empty());

        let transport: Arc<dyn DatagramTransport> = server_end;
        DtlsServerProtocol::new(Arc::new(config().build().unwrap())).accept(
            Arc::new(TestServer::new(certificate("server"))),
            transport,
            Some(request),
        )
    });

    let transport: Arc<dyn DatagramTransport> = pipe.client.clone();
    let c = dgramtls::DtlsClientProtocol::new(Arc::new(config().build().unwrap()))
        .connect(Arc::new(TestClient::new()), transport)
        .expect("client");
    let s = server.join().unwrap().expect("server");

    assert_delivers(&c, &s, b"cookie ok");
    assert_delivers(&s, &c, b"cookie ok too");
}

#[test]
fn garbage_datagrams_are_ignored() {
    let _ = env_logger::try_init();

    let pipe = Pipe::new(MTU);
    let (c, s) = ecdhe_pair(&pipe);

    // Truncated header, unknown content type, bogus application data.
    pipe.server.inject(&[23, 0xfe, 0xfd]);
    pipe.server.inject(&[99, 0xfe, 0xfd, 0, 1, 0, 0, 0, 0, 0, 9, 0, 1, 0]);
    pipe.server.inject(&[23, 0xfe, 0xfd, 0, 1, 0, 0, 0, 0, 0, 9, 0, 4, 1, 2, 3, 4]);

    assert_delivers(&c, &s, b"survives");
    assert!(!s.is_closed());
}
