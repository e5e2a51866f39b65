//! HTTP signaling endpoint
//!
//! Browsers or `rtc-signal peer` post their offer and candidates here. The
//! answer and our candidates come back in the response body, drained from
//! the [`Mailbox`] the driver reports to.

use std::sync::Arc;

use anyhow::anyhow;
use rouille::{input::json_input, router, Request, Response, Server};
use tracing::{info, warn};

use rtc_signal::{
    util::init_log, IceCandidate, Mailbox, SessionDescription, SignalConfig, SignalError,
    SignalHandle,
};

pub fn main(http_addr: &str) -> anyhow::Result<()> {
    init_log();

    let config = SignalConfig::from_env()?;
    // Stream notices are only logged here; nobody would drain them.
    let mailbox = Arc::new(Mailbox::signals_only());
    let handle = SignalHandle::spawn(config, &mailbox)?;

    let server = Server::new(http_addr, move |request| {
        web_request(request, &handle, &mailbox)
    })
    .map_err(|e| anyhow!("starting the web server: {e}"))?;

    info!("Signaling on http://{}", server.server_addr());

    server.run();

    Ok(())
}

fn web_request(request: &Request, handle: &SignalHandle, mailbox: &Mailbox) -> Response {
    info!("{} {}", request.method(), request.url());

    router!(request,
        (POST) (/peers/{id: String}/offer) => {
            let offer: SessionDescription = match json_input(request) {
                Ok(offer) => offer,
                Err(e) => return bad_request(e),
            };
            handle_offer(handle, mailbox, id, offer)
        },

        (POST) (/peers/{id: String}/candidate) => {
            let candidate: IceCandidate = match json_input(request) {
                Ok(candidate) => candidate,
                Err(e) => return bad_request(e),
            };
            match handle.add_ice_candidate(candidate, id) {
                Ok(()) => Response::empty_204(),
                Err(e) => error_response(e),
            }
        },

        (DELETE) (/peers/{id: String}) => {
            match handle.remove_connection(id.as_str()) {
                Ok(true) => {
                    // Anything still queued for the peer is now pointless.
                    mailbox.drain(&id);
                    Response::empty_204()
                }
                Ok(false) => Response::empty_404(),
                Err(e) => error_response(e),
            }
        },

        _ => Response::empty_404()
    )
}

/// Registers the peer on its first offer, applies the offer and returns
/// everything queued for the peer (answer and candidates).
fn handle_offer(
    handle: &SignalHandle,
    mailbox: &Mailbox,
    id: String,
    offer: SessionDescription,
) -> Response {
    match handle.add_connection(id.as_str()) {
        Ok(()) => info!("New peer {}", id),
        Err(SignalError::DuplicatePeer(_)) => info!("Renegotiation from {}", id),
        Err(e) => return error_response(e),
    }

    if let Err(e) = handle.set_remote_description(offer, id.as_str(), true) {
        return error_response(e);
    }

    Response::json(&mailbox.drain(&id))
}

fn bad_request(e: impl std::fmt::Display) -> Response {
    warn!("Bad request: {}", e);
    Response::text(e.to_string()).with_status_code(400)
}

fn error_response(e: SignalError) -> Response {
    warn!("Signaling failed: {}", e);
    Response::text(e.to_string()).with_status_code(status_code(&e))
}

fn status_code(e: &SignalError) -> u16 {
    match e {
        SignalError::UnknownPeer(_) => 404,
        SignalError::DuplicatePeer(_)
        | SignalError::OfferPending(_)
        | SignalError::NoPendingOffer(_)
        | SignalError::UnexpectedDescription { .. }
        | SignalError::NothingToNegotiate(_) => 409,
        SignalError::InvalidDescription(_)
        | SignalError::InvalidCandidate(_)
        | SignalError::Negotiation(_) => 400,
        SignalError::DriverStopped => 503,
        SignalError::NoCandidates | SignalError::Config(_) | SignalError::Io(_) => 500,
    }
}

#[cfg(test)]
mod tests {
    use rtc_signal::{PeerId, PeerRegistry, SignalMessage};
    use str0m::Candidate;

    use super::*;

    #[test]
    fn errors_map_to_http_status() {
        let peer = || PeerId::from("alice");
        assert_eq!(status_code(&SignalError::UnknownPeer(peer())), 404);
        assert_eq!(status_code(&SignalError::OfferPending(peer())), 409);
        assert_eq!(
            status_code(&SignalError::InvalidCandidate("x".into())),
            400
        );
        assert_eq!(status_code(&SignalError::DriverStopped), 503);
    }

    fn offer_from(remote: &mut PeerRegistry, mailbox: &Mailbox, id: &str) -> SessionDescription {
        remote.add_connection(id).unwrap();
        remote.create_offer(id).unwrap();
        mailbox
            .drain(id)
            .into_iter()
            .find_map(|m| match m {
                SignalMessage::Offer(o) => Some(o),
                _ => None,
            })
            .unwrap()
    }

    fn replies(response: Response) -> Vec<SignalMessage> {
        let (reader, _) = response.data.into_reader_and_size();
        serde_json::from_reader(reader).unwrap()
    }

    #[test]
    fn offer_endpoint_answers_with_queued_signals() {
        let mailbox = Arc::new(Mailbox::default());
        let handle = SignalHandle::spawn(
            SignalConfig {
                bind_addr: "127.0.0.1:0".parse().unwrap(),
                ..SignalConfig::default()
            },
            &mailbox,
        )
        .unwrap();

        // A second registry stands in for the browser.
        let remote_box = Arc::new(Mailbox::default());
        let mut remote = PeerRegistry::new(
            SignalConfig::default(),
            vec![Candidate::host("127.0.0.1:5000".parse().unwrap(), "udp").unwrap()],
            &remote_box,
        );
        let first = offer_from(&mut remote, &remote_box, "server-a");
        let second = offer_from(&mut remote, &remote_box, "server-b");

        let response = handle_offer(&handle, &mailbox, "browser".into(), first);
        assert_eq!(response.status_code, 200);

        let messages = replies(response);
        let answers = messages
            .iter()
            .filter(|m| matches!(m, SignalMessage::Answer(_)))
            .count();
        assert_eq!(answers, 1);
        let candidates: Vec<_> = messages
            .iter()
            .filter_map(|m| match m {
                SignalMessage::Candidate(c) => Some(c.to_candidate().unwrap().addr()),
                _ => None,
            })
            .collect();
        assert_eq!(candidates, vec![handle.local_addr()]);
        assert_eq!(answers + candidates.len(), messages.len());

        // An offer for a peer that is already registered is still answered.
        handle.add_connection("browser2").unwrap();
        let again = handle_offer(&handle, &mailbox, "browser2".into(), second);
        assert_eq!(again.status_code, 200);
        let answers = replies(again)
            .into_iter()
            .filter(|m| matches!(m, SignalMessage::Answer(_)))
            .count();
        assert_eq!(answers, 1);

        handle.shutdown();
    }
}
