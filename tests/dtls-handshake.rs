//! DTLS 1.2 handshake tests over an in-memory datagram pipe.

mod dtls_common;

use std::sync::Arc;

use dgramtls::types::{AlertDescription, CipherSuite};
use dgramtls::{fingerprint, ClientAuth, Error};
use dtls_common::*;

#[test]
fn ecdhe_handshake_exchanges_data() {
    let _ = env_logger::try_init();

    let server_cert = certificate("server");
    let expected = server_cert.fingerprint();
    let pipe = Pipe::new(MTU);
    let client = Arc::new(TestClient::new());
    let server = Arc::new(TestServer::new(server_cert));

    let (c, s) = handshake(
        &pipe,
        config().build().unwrap(),
        client.clone(),
        config().build().unwrap(),
        server.clone(),
    );
    let c = c.expect("client handshake");
    let s = s.expect("server handshake");

    assert!(*client.completed.lock().unwrap());
    let chain = client.server_chain.lock().unwrap().clone().expect("server chain");
    assert_eq!(chain.len(), 1);
    assert_eq!(fingerprint(&chain[0]), expected);

    // No client certificate was asked for by default.
    assert!(!*client.certificate_requested.lock().unwrap());
    assert!(server.client_chain.lock().unwrap().is_none());

    assert_delivers(&c, &s, b"hello server");
    assert_delivers(&s, &c, b"hello client");
}

#[test]
fn aes256_suite_is_negotiated_when_preferred() {
    let _ = env_logger::try_init();

    let pipe = Pipe::new(MTU);
    let client = Arc::new(TestClient::new());
    let server = Arc::new(TestServer::new(certificate("server")));

    let server_config = config()
        .cipher_suites(&[CipherSuite::ECDHE_ECDSA_AES256_GCM_SHA384])
        .build()
        .unwrap();
    let (c, s) = handshake(&pipe, config().build().unwrap(), client.clone(), server_config, server);
    let (c, s) = (c.unwrap(), s.unwrap());

    let session = client.session().expect("session");
    assert_eq!(
        session.parameters().unwrap().cipher_suite,
        CipherSuite::ECDHE_ECDSA_AES256_GCM_SHA384
    );
    assert_delivers(&c, &s, b"sha384");
}

#[test]
fn psk_handshake() {
    let _ = env_logger::try_init();

    let pipe = Pipe::new(MTU);
    let client = Arc::new(TestClient::with_psk(PSK_IDENTITY, PSK_KEY));
    let server = Arc::new(TestServer::with_psk(PSK_IDENTITY, PSK_KEY));

    let suites = [CipherSuite::PSK_AES128_GCM_SHA256];
    let (c, s) = handshake(
        &pipe,
        config().cipher_suites(&suites).build().unwrap(),
        client.clone(),
        config().cipher_suites(&suites).build().unwrap(),
        server,
    );
    let (c, s) = (c.expect("client"), s.expect("server"));

    assert!(client.server_chain.lock().unwrap().is_none());
    assert_delivers(&c, &s, b"psk ping");
    assert_delivers(&s, &c, b"psk pong");
}

#[test]
fn unknown_psk_identity_fails() {
    let _ = env_logger::try_init();

    let pipe = Pipe::new(MTU);
    let client = Arc::new(TestClient::with_psk(b"stranger", PSK_KEY));
    let server = Arc::new(TestServer::with_psk(PSK_IDENTITY, PSK_KEY));

    let suites = [CipherSuite::PSK_AES128_GCM_SHA256];
    let (c, s) = handshake(
        &pipe,
        config().cipher_suites(&suites).build().unwrap(),
        client.clone(),
        config().cipher_suites(&suites).build().unwrap(),
        server.clone(),
    );

    let err = s.unwrap_err();
    assert_eq!(err.alert_description(), Some(AlertDescription::UnknownPskIdentity));
    assert!(matches!(
        c.unwrap_err(),
        Error::AlertReceived(AlertDescription::UnknownPskIdentity)
    ));
    assert_eq!(
        *server.alerts_raised.lock().unwrap(),
        vec![AlertDescription::UnknownPskIdentity]
    );
}

#[test]
fn no_common_suite_fails() {
    let _ = env_logger::try_init();

    let pipe = Pipe::new(MTU);
    // The client has no PSK identity, so it cannot offer the PSK suite.
    let client = Arc::new(TestClient::new());
    let server = Arc::new(TestServer::with_psk(PSK_IDENTITY, PSK_KEY));

    let (c, s) = handshake(
        &pipe,
        config().build().unwrap(),
        client,
        config()
            .cipher_suites(&[CipherSuite::PSK_AES128_GCM_SHA256])
            .build()
            .unwrap(),
        server,
    );

    assert_eq!(
        s.unwrap_err().alert_description(),
        Some(AlertDescription::HandshakeFailure)
    );
    assert!(matches!(
        c.unwrap_err(),
        Error::AlertReceived(AlertDescription::HandshakeFailure)
    ));
}

#[test]
fn session_resumption() {
    let _ = env_logger::try_init();

    let server = Arc::new(TestServer::new(certificate("server")));

    let first = Arc::new(TestClient::new());
    let pipe = Pipe::new(MTU);
    let (c, s) = handshake(
        &pipe,
        config().build().unwrap(),
        first.clone(),
        config().build().unwrap(),
        server.clone(),
    );
    c.unwrap();
    s.unwrap();

    let session = first.session().expect("first session");
    assert!(session.is_resumable());
    assert_eq!(session.id().as_ref().len(), 32);
    assert_eq!(server.cache.len(), 1);

    let second = Arc::new(TestClient::resuming(session.clone()));
    let pipe = Pipe::new(MTU);
    let (c, s) = handshake(
        &pipe,
        config().build().unwrap(),
        second.clone(),
        config().build().unwrap(),
        server.clone(),
    );
    let (c, s) = (c.expect("resumed client"), s.expect("resumed server"));

    // An abbreviated handshake carries no certificate and stores no new
    // session on the server.
    assert!(second.server_chain.lock().unwrap().is_none());
    assert!(second.session().expect("resumed session").same_as(&session));
    assert_eq!(server.sessions_established(), 1);

    assert_delivers(&c, &s, b"resumed");
    assert_delivers(&s, &c, b"resumed too");
}

#[test]
fn unknown_session_falls_back_to_full_handshake() {
    let _ = env_logger::try_init();

    let server_a = Arc::new(TestServer::new(certificate("a")));
    let first = Arc::new(TestClient::new());
    let pipe = Pipe::new(MTU);
    let (c, s) = handshake(
        &pipe,
        config().build().unwrap(),
        first.clone(),
        config().build().unwrap(),
        server_a,
    );
    c.unwrap();
    s.unwrap();
    let session = first.session().unwrap();

    // A different server never saw that session.
    let server_b = Arc::new(TestServer::new(certificate("b")));
    let second = Arc::new(TestClient::resuming(session.clone()));
    let pipe = Pipe::new(MTU);
    let (c, s) = handshake(
        &pipe,
        config().build().unwrap(),
        second.clone(),
        config().build().unwrap(),
        server_b.clone(),
    );
    let (c, s) = (c.unwrap(), s.unwrap());

    assert!(second.server_chain.lock().unwrap().is_some());
    assert!(!second.session().unwrap().same_as(&session));
    assert_eq!(server_b.sessions_established(), 1);
    assert_delivers(&c, &s, b"full");
}

#[test]
fn required_client_certificate_is_sent() {
    let _ = env_logger::try_init();

    let client_cert = certificate("client");
    let expected = client_cert.fingerprint();
    let pipe = Pipe::new(MTU);
    let client = Arc::new(TestClient::with_certificate(client_cert));
    let server = Arc::new(TestServer::new(certificate("server")));

    let (c, s) = handshake(
        &pipe,
        config().build().unwrap(),
        client.clone(),
        config().client_auth(ClientAuth::Required).build().unwrap(),
        server.clone(),
    );
    let (c, s) = (c.expect("client"), s.expect("server"));

    assert!(*client.certificate_requested.lock().unwrap());
    let chain = server.client_chain.lock().unwrap().clone().expect("client chain");
    assert_eq!(fingerprint(&chain[0]), expected);
    assert_delivers(&c, &s, b"authenticated");
}

#[test]
fn optional_client_auth_accepts_empty_certificate() {
    let _ = env_logger::try_init();

    let pipe = Pipe::new(MTU);
    let client = Arc::new(TestClient::new());
    let server = Arc::new(TestServer::new(certificate("server")));

    let (c, s) = handshake(
        &pipe,
        config().build().unwrap(),
        client.clone(),
        config().client_auth(ClientAuth::Optional).build().unwrap(),
        server.clone(),
    );
    let (c, s) = (c.expect("client"), s.expect("server"));

    assert!(*client.certificate_requested.lock().unwrap());
    assert!(server.client_chain.lock().unwrap().is_none());
    assert_delivers(&c, &s, b"anonymous");
}

#[test]
fn required_client_auth_without_certificate_fails() {
    let _ = env_logger::try_init();

    let pipe = Pipe::new(MTU);
    let client = Arc::new(TestClient::new());
    let server = Arc::new(TestServer::new(certificate("server")));

    let (c, s) = handshake(
        &pipe,
        config().build().unwrap(),
        client,
        config().client_auth(ClientAuth::Required).build().unwrap(),
        server,
    );

    assert_eq!(
        s.unwrap_err().alert_description(),
        Some(AlertDescription::HandshakeFailure)
    );
    assert!(matches!(
        c.unwrap_err(),
        Error::AlertReceived(AlertDescription::HandshakeFailure)
    ));
}

#[test]
fn rejected_client_certificate_fails() {
    let _ = env_logger::try_init();

    let pipe = Pipe::new(MTU);
    let client = Arc::new(TestClient::with_certificate(certificate("client")));
    let mut server = TestServer::new(certificate("server"));
    server.reject_client_certificates = true;

    let (c, s) = handshake(
        &pipe,
        config().build().unwrap(),
        client,
        config().client_auth(ClientAuth::Required).build().unwrap(),
        Arc::new(server),
    );

    assert_eq!(
        s.unwrap_err().alert_description(),
        Some(AlertDescription::BadCertificate)
    );
    assert!(matches!(
        c.unwrap_err(),
        Error::AlertReceived(AlertDescription::BadCertificate)
    ));
}

#[test]
fn required_extended_master_secret_rejects_legacy_client() {
    let _ = env_logger::try_init();

    let pipe = Pipe::new(MTU);
    let (c, s) = handshake(
        &pipe,
        config().with_extended_master_secret(false).build().unwrap(),
        Arc::new(TestClient::new()),
        config().require_extended_master_secret(true).build().unwrap(),
        Arc::new(TestServer::new(certificate("server"))),
    );

    assert_eq!(
        s.unwrap_err().alert_description(),
        Some(AlertDescription::HandshakeFailure)
    );
    assert!(matches!(
        c.unwrap_err(),
        Error::AlertReceived(AlertDescription::HandshakeFailure)
    ));
}

#[test]
fn handshake_without_extended_master_secret() {
    let _ = env_logger::try_init();

    let pipe = Pipe::new(MTU);
    let client = Arc::new(TestClient::new());
    let (c, s) = handshake(
        &pipe,
        config()
            .with_extended_master_secret(false)
            .require_extended_master_secret(false)
            .build()
            .unwrap(),
        client.clone(),
        config().require_extended_master_secret(false).build().unwrap(),
        Arc::new(TestServer::new(certificate("server"))),
    );
    let (c, s) = (c.unwrap(), s.unwrap());

    assert!(!client.session().unwrap().parameters().unwrap().extended_master_secret);
    assert_delivers(&c, &s, b"legacy");
}

#[test]
fn stapled_ocsp_response_and_session_ticket() {
    let _ = env_logger::try_init();

    let pipe = Pipe::new(MTU);
    let client = Arc::new(TestClient::new());
    let mut server = TestServer::new(certificate("server"));
    server.ocsp_response = Some(b"ocsp response".to_vec());
    server.tickets = true;

    let (c, s) = handshake(
        &pipe,
        config()
            .request_certificate_status(true)
            .request_session_ticket(true)
            .build()
            .unwrap(),
        client.clone(),
        config().build().unwrap(),
        Arc::new(server),
    );
    let (c, s) = (c.unwrap(), s.unwrap());

    assert_eq!(
        client.ocsp_response.lock().unwrap().as_deref(),
        Some(&b"ocsp response"[..])
    );
    let ticket = client.ticket.lock().unwrap().clone().expect("ticket");
    assert_eq!(ticket.ticket_lifetime_hint, 3600);
    assert_eq!(ticket.ticket, b"opaque ticket");
    assert_delivers(&c, &s, b"stapled");
}

#[test]
fn unsolicited_status_is_not_stapled() {
    let _ = env_logger::try_init();

    let pipe = Pipe::new(MTU);
    let client = Arc::new(TestClient::new());
    let mut server = TestServer::new(certificate("server"));
    server.ocsp_response = Some(b"ocsp response".to_vec());
    server.tickets = true;

    let (c, s) = handshake(
        &pipe,
        config().build().unwrap(),
        client.clone(),
        config().build().unwrap(),
        Arc::new(server),
    );
    c.unwrap();
    s.unwrap();

    assert!(client.ocsp_response.lock().unwrap().is_none());
    assert!(client.ticket.lock().unwrap().is_none());
}

#[test]
fn handshake_times_out_without_server() {
    let _ = env_logger::try_init();

    let pipe = Pipe::new(MTU);
    let config = config()
        .handshake_timeout(std::time::Duration::from_millis(400))
        .build()
        .unwrap();

    let transport: Arc<dyn dgramtls::DatagramTransport> = pipe.client.clone();
    let err = dgramtls::DtlsClientProtocol::new(Arc::new(config))
        .connect(Arc::new(TestClient::new()), transport)
        .unwrap_err();

    assert!(matches!(err, Error::Timeout(_)), "got {:?}", err);
    // The ClientHello went out and was retransmitted.
    assert!(pipe.server.pending() >= 2);
}
