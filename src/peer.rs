//! Offering peer client
//!
//! Connects to a `rtc-signal serve` instance: registers the server as a
//! peer, posts our offer, applies the answer and the server's candidates,
//! posts our own candidates and then reports streams until Ctrl-C.

use std::{sync::Arc, time::Duration};

use anyhow::{bail, Context};
use tracing::info;

use rtc_signal::{
    util::init_log, Mailbox, SignalConfig, SignalError, SignalHandle, SignalMessage, StreamChange,
};

/// The server is known to us under this id.
const SERVER: &str = "server";

/// Runs a blocking handle call off the async runtime.
async fn call<T, F>(handle: &SignalHandle, f: F) -> anyhow::Result<T>
where
    F: FnOnce(&SignalHandle) -> Result<T, SignalError> + Send + 'static,
    T: Send + 'static,
{
    let handle = handle.clone();
    let result = tokio::task::spawn_blocking(move || f(&handle))
        .await
        .context("signaling call did not complete")?;
    Ok(result?)
}

pub fn main(server_url: String) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed building the Runtime")
        .block_on(run(server_url))
}

async fn run(server_url: String) -> anyhow::Result<()> {
    init_log();

    let server_url = server_url.trim_end_matches('/');
    let local_id = format!("peer-{}", std::process::id());

    let config = SignalConfig::from_env()?;
    let mailbox = Arc::new(Mailbox::default());
    let handle = SignalHandle::spawn(config, &mailbox)?;

    call(&handle, |h| h.add_connection(SERVER)).await?;
    call(&handle, |h| h.create_offer(SERVER)).await?;

    let mut offer = None;
    let mut candidates = vec![];
    for message in mailbox.drain(SERVER) {
        match message {
            SignalMessage::Offer(o) => offer = Some(o),
            SignalMessage::Candidate(c) => candidates.push(c),
            SignalMessage::Answer(_) => {}
        }
    }
    let offer = offer.context("no offer was produced")?;

    info!("Offer SDP:\n{}", offer.sdp);

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{server_url}/peers/{local_id}/offer"))
        .json(&offer)
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("server rejected offer: {} {}", status, body);
    }
    let replies: Vec<SignalMessage> = response.json().await?;

    for reply in replies {
        match reply {
            SignalMessage::Answer(answer) => {
                info!("Answer SDP:\n{}", answer.sdp);
                call(&handle, move |h| h.set_remote_description(answer, SERVER, false)).await?;
            }
            SignalMessage::Candidate(c) => {
                call(&handle, move |h| h.add_ice_candidate(c, SERVER)).await?;
            }
            SignalMessage::Offer(_) => bail!("server sent an offer in reply to ours"),
        }
    }

    for candidate in candidates {
        client
            .post(format!("{server_url}/peers/{local_id}/candidate"))
            .json(&candidate)
            .send()
            .await?
            .error_for_status()?;
    }

    info!("Negotiated with {}, waiting for streams (Ctrl-C to stop)", server_url);

    let mut tick = tokio::time::interval(Duration::from_millis(500));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tick.tick() => {
                for change in mailbox.drain_streams() {
                    match change {
                        StreamChange::Added(s) => info!("Receiving {:?} on {}", s.kind, s.mid),
                        StreamChange::Removed(s) => info!("Stopped {:?} on {}", s.kind, s.mid),
                    }
                }
            }
        }
    }

    client
        .delete(format!("{server_url}/peers/{local_id}"))
        .send()
        .await?;
    call(&handle, |h| h.remove_connection(SERVER)).await?;
    handle.shutdown();

    Ok(())
}
