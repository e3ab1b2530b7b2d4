//! Steps shared by the client and server handshakes.

use super::handshake_hash::HandshakeHash;
use super::heartbeat::{DefaultHeartbeat, Heartbeat};
use super::record_layer::DtlsRecordLayer;
use super::session::{SecurityParameters, Session};
use crate::buffer::Buf;
use crate::crypto::key_schedule::KeySchedule;
use crate::crypto::CryptoProvider;
use crate::message::{Extensions, Random};
use crate::types::{AlertDescription, ConnectionEnd, ExtensionType, HeartbeatMode};
use crate::util::constant_time_eq;
use crate::{Config, Error};

/// Last eight bytes of a server random negotiating TLS 1.1 or below
/// while able to do better (rfc8446 4.1.3).
const DOWNGRADE_TLS11: &[u8; 8] = b"DOWNGRD\x00";
const DOWNGRADE_TLS12: &[u8; 8] = b"DOWNGRD\x01";

/// Serialize a message body into a fresh vector.
pub(crate) fn encode(f: impl FnOnce(&mut Buf)) -> Vec<u8> {
    let mut body = Buf::new();
    f(&mut body);
    body.into_vec()
}

/// Client side: a server that picked an older version must not carry a
/// downgrade sentinel in its random.
pub(crate) fn check_downgrade(server_random: &Random) -> Result<(), Error> {
    let tail = &server_random.0[Random::LEN - 8..];
    if tail == DOWNGRADE_TLS11 || tail == DOWNGRADE_TLS12 {
        return Err(Error::illegal_parameter("downgrade sentinel in server random"));
    }
    Ok(())
}

/// `ec_point_formats` must list `uncompressed` when present.
pub(crate) fn check_ec_point_formats(extensions: &Extensions) -> Result<(), Error> {
    let Some(data) = extensions.get(ExtensionType::EcPointFormats) else {
        return Ok(());
    };
    match data.split_first() {
        Some((&len, formats)) if len as usize == formats.len() && !formats.is_empty() => {
            if formats.contains(&0) {
                Ok(())
            } else {
                Err(Error::illegal_parameter("uncompressed point format not offered"))
            }
        }
        _ => Err(Error::decode_error("malformed ec_point_formats")),
    }
}

/// The empty `renegotiation_info` of an initial handshake.
pub(crate) fn check_renegotiation_info(extensions: &Extensions) -> Result<bool, Error> {
    match extensions.renegotiation_info()? {
        None => Ok(false),
        Some(info) if info.is_empty() => Ok(true),
        Some(_) => Err(Error::handshake_failure(
            "renegotiated_connection must be empty in an initial handshake",
        )),
    }
}

/// Derive the master secret from the premaster secret, using the session
/// hash when extended master secret was negotiated.
pub(crate) fn establish_master_secret(
    params: &mut SecurityParameters,
    provider: &CryptoProvider,
    pre_master_secret: &[u8],
) -> Result<(), Error> {
    let schedule = KeySchedule::new(provider, params.prf_hash);
    params.master_secret = if params.extended_master_secret {
        schedule.extended_master_secret(pre_master_secret, &params.session_hash)?
    } else {
        schedule.master_secret(
            pre_master_secret,
            params.client_random.as_ref(),
            params.server_random.as_ref(),
        )?
    };
    Ok(())
}

/// Expand the key block into the record cipher for the next epoch.
pub(crate) fn init_pending_epoch(
    record_layer: &DtlsRecordLayer,
    params: &SecurityParameters,
    provider: &CryptoProvider,
) -> Result<(), Error> {
    let suite = provider.find_cipher_suite(params.cipher_suite).ok_or_else(|| {
        Error::internal_error(format!("{:?} not supported by provider", params.cipher_suite))
    })?;
    let cipher = KeySchedule::new(provider, params.prf_hash).record_cipher(
        suite,
        &params.master_secret,
        params.client_random.as_ref(),
        params.server_random.as_ref(),
        params.entity,
        &params.connection_id_peer,
        &params.connection_id_local,
    )?;
    record_layer.init_pending_epoch(
        Box::new(cipher),
        params.connection_id_local.clone(),
        params.connection_id_peer.clone(),
    )
}

/// verify_data of the Finished sent by `end` over the transcript so far.
pub(crate) fn calculate_verify_data(
    params: &SecurityParameters,
    provider: &CryptoProvider,
    end: ConnectionEnd,
    handshake_hash: &HandshakeHash,
) -> Result<Vec<u8>, Error> {
    let hash = handshake_hash.current_hash(provider, params.prf_hash)?;
    KeySchedule::new(provider, params.prf_hash).verify_data(
        &params.master_secret,
        end,
        &hash,
        params.cipher_suite.verify_data_length(),
    )
}

pub(crate) fn check_finished(expected: &[u8], received: &[u8]) -> Result<(), Error> {
    if !constant_time_eq(expected, received) {
        return Err(Error::alert(
            AlertDescription::DecryptError,
            "Finished verify_data mismatch",
        ));
    }
    Ok(())
}

/// Apply a negotiated max_fragment_length to the record layer.
pub(crate) fn apply_plaintext_limit(record_layer: &DtlsRecordLayer, params: &SecurityParameters) {
    if let Some(max) = params.max_fragment_length {
        debug!("Plaintext limit {} (max_fragment_length)", max.limit());
        record_layer.set_plaintext_limit(max.limit());
    }
}

/// Start heartbeats as negotiated. We send requests when the peer allows
/// it and an interval is configured, and answer requests when we allowed
/// the peer to send them.
pub(crate) fn init_heartbeat(
    record_layer: &DtlsRecordLayer,
    config: &Config,
    params: &SecurityParameters,
) {
    let Some(peer_mode) = params.heartbeat_peer_mode else {
        return;
    };

    let heartbeat = match (peer_mode, config.heartbeat_interval()) {
        (HeartbeatMode::PeerAllowedToSend, Some(interval)) => Some(Box::new(
            DefaultHeartbeat::new(interval, config.heartbeat_timeout()),
        ) as Box<dyn Heartbeat>),
        _ => None,
    };
    let responder = config.heartbeat_policy() == Some(HeartbeatMode::PeerAllowedToSend);

    if heartbeat.is_some() || responder {
        debug!(
            "Heartbeat: sending {}, responding {}",
            heartbeat.is_some(),
            responder
        );
        record_layer.init_heartbeat(heartbeat, responder);
    }
}

/// Tear down after a failed handshake. The session can no longer be
/// resumed and the peer is told why, unless it told us.
pub(crate) fn abort_handshake(
    record_layer: &DtlsRecordLayer,
    session: Option<&Session>,
    error: &Error,
) {
    debug!("Handshake failed: {}", error);
    if let Some(session) = session {
        session.invalidate();
    }
    if let Some(description) = error.alert_description() {
        record_layer.fail(description);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downgrade_sentinels() {
        let mut random = Random([7; 32]);
        assert!(check_downgrade(&random).is_ok());

        random.0[24..].copy_from_slice(DOWNGRADE_TLS12);
        let err = check_downgrade(&random).unwrap_err();
        assert_eq!(err.alert_description(), Some(AlertDescription::IllegalParameter));

        random.0[24..].copy_from_slice(DOWNGRADE_TLS11);
        assert!(check_downgrade(&random).is_err());
    }

    #[test]
    fn point_formats() {
        let mut exts = Extensions::new();
        assert!(check_ec_point_formats(&exts).is_ok());
        exts.add_ec_point_formats();
        assert!(check_ec_point_formats(&exts).is_ok());

        let mut compressed_only = Extensions::new();
        compressed_only.push(ExtensionType::EcPointFormats, vec![1, 1]);
        assert!(check_ec_point_formats(&compressed_only).is_err());
    }

    #[test]
    fn renegotiation_info() {
        let mut exts = Extensions::new();
        assert!(!check_renegotiation_info(&exts).unwrap());
        exts.add_renegotiation_info(&[]);
        assert!(check_renegotiation_info(&exts).unwrap());

        let mut renegotiating = Extensions::new();
        renegotiating.add_renegotiation_info(&[1; 12]);
        let err = check_renegotiation_info(&renegotiating).unwrap_err();
        assert_eq!(err.alert_description(), Some(AlertDescription::HandshakeFailure));
    }

    #[test]
    fn finished_mismatch_is_decrypt_error() {
        assert!(check_finished(&[1; 12], &[1; 12]).is_ok());
        let err = check_finished(&[1; 12], &[2; 12]).unwrap_err();
        assert_eq!(err.alert_description(), Some(AlertDescription::DecryptError));
        assert!(check_finished(&[1; 12], &[1; 11]).is_err());
    }
}
