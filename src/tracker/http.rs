use super::error::TrackerError;
use super::response::{parse_compact_peers, parse_peer_dicts, AnnounceResponse, Peer, TrackerEvent};
use crate::bencode::decode;
use crate::constants::{HTTP_TRACKER_TIMEOUT, TRACKER_DEFAULT_INTERVAL, USER_AGENT};
use reqwest::Client;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

/// Builds the announce URL for a tracker request.
///
/// `info_hash` and `peer_id` are appended as raw bytes percent-encoded
/// exactly once; the remaining parameters are decimal. `compact=1` is
/// always requested, and `event` is appended only when it is not
/// [`TrackerEvent::None`].
#[allow(clippy::too_many_arguments)]
pub fn build_announce_url(
    base: &str,
    info_hash: &[u8; 20],
    peer_id: &[u8; 20],
    port: u16,
    uploaded: u64,
    downloaded: u64,
    left: u64,
    event: TrackerEvent,
) -> String {
    let separator = if base.contains('?') { '&' } else { '?' };
    let mut url = format!(
        "{}{}info_hash={}&peer_id={}&port={}&uploaded={}&downloaded={}&left={}&compact=1",
        base,
        separator,
        url_encode(info_hash),
        url_encode(peer_id),
        port,
        uploaded,
        downloaded,
        left
    );

    let event_str = event.as_str();
    if !event_str.is_empty() {
        url.push_str("&event=");
        url.push_str(event_str);
    }

    url
}

/// An HTTP tracker client ([BEP-3]).
///
/// # Examples
///
/// ```no_run
/// use remora::tracker::{HttpTracker, TrackerEvent};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let tracker = HttpTracker::new("http://tracker.example.com/announce")?;
///
/// let response = tracker
///     .announce(&[0u8; 20], &[0u8; 20], 6881, 0, 0, 1000, TrackerEvent::Started)
///     .await?;
///
/// println!("Found {} peers", response.peers.len());
/// # Ok(())
/// # }
/// ```
///
/// [BEP-3]: http://bittorrent.org/beps/bep_0003.html
pub struct HttpTracker {
    client: Client,
    url: String,
}

impl HttpTracker {
    pub fn new(url: &str) -> Result<Self, TrackerError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(TrackerError::InvalidUrl(url.to_string()));
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(HTTP_TRACKER_TIMEOUT)
            .build()
            .map_err(TrackerError::Http)?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    /// Announces to the tracker and returns the parsed peer set.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-2xx status, a
    /// `failure reason` in the response body, or a body that is not a
    /// bencoded dictionary carrying `peers`.
    #[allow(clippy::too_many_arguments)]
    pub async fn announce(
        &self,
        info_hash: &[u8; 20],
        peer_id: &[u8; 20],
        port: u16,
        uploaded: u64,
        downloaded: u64,
        left: u64,
        event: TrackerEvent,
    ) -> Result<AnnounceResponse, TrackerError> {
        let url = build_announce_url(
            &self.url, info_hash, peer_id, port, uploaded, downloaded, left, event,
        );

        debug!(tracker = %self.url, event = event.as_str(), "announcing");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TrackerError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        parse_announce_response(&body)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

pub(super) fn parse_announce_response(body: &[u8]) -> Result<AnnounceResponse, TrackerError> {
    let value = decode(body)?;
    let dict = value
        .as_dict()
        .ok_or(TrackerError::Malformed("expected dictionary"))?;

    if let Some(failure) = dict
        .get(b"failure reason".as_slice())
        .and_then(|v| v.as_str())
    {
        return Err(TrackerError::Failure(failure.to_string()));
    }

    let interval = dict
        .get(b"interval".as_slice())
        .and_then(|v| v.as_integer())
        .filter(|&i| i > 0)
        .map(|i| Duration::from_secs(i as u64))
        .unwrap_or(TRACKER_DEFAULT_INTERVAL);

    let min_interval = dict
        .get(b"min interval".as_slice())
        .and_then(|v| v.as_integer())
        .filter(|&i| i > 0)
        .map(|i| Duration::from_secs(i as u64));

    let complete = dict
        .get(b"complete".as_slice())
        .and_then(|v| v.as_integer())
        .map(|v| v as u32);

    let incomplete = dict
        .get(b"incomplete".as_slice())
        .and_then(|v| v.as_integer())
        .map(|v| v as u32);

    let warning_message = dict
        .get(b"warning message".as_slice())
        .and_then(|v| v.as_str())
        .map(String::from);

    if let Some(warning) = &warning_message {
        warn!(warning, "tracker warning");
    }

    let peers_value = dict
        .get(b"peers".as_slice())
        .ok_or(TrackerError::Malformed("missing peers"))?;

    let peers = if let Some(bytes) = peers_value.as_bytes() {
        parse_compact_peers(bytes)?
    } else if let Some(list) = peers_value.as_list() {
        parse_peer_dicts(list)
    } else {
        return Err(TrackerError::Malformed("peers is neither string nor list"));
    };

    Ok(AnnounceResponse {
        interval,
        min_interval,
        complete,
        incomplete,
        warning_message,
        peers,
    })
}

struct TrackerEntry {
    client: HttpTracker,
    /// Whether `started` has already been sent to this tracker.
    announced: bool,
    /// Whether any announce to this tracker ever succeeded.
    contacted: bool,
}

/// Failover across a torrent's tracker list.
///
/// Trackers are attempted in metainfo order. The first announce to
/// each tracker carries the `started` event; later announces to the
/// same tracker omit it. Peers from every tracker that answers are
/// aggregated and deduplicated by address.
pub struct TrackerSet {
    trackers: Vec<TrackerEntry>,
}

impl TrackerSet {
    /// Builds a tracker set from announce URLs, skipping schemes this
    /// client does not speak (e.g. `udp://`).
    pub fn new(urls: &[String]) -> Self {
        let mut trackers = Vec::new();

        for url in urls {
            match HttpTracker::new(url) {
                Ok(client) => trackers.push(TrackerEntry {
                    client,
                    announced: false,
                    contacted: false,
                }),
                Err(_) => {
                    debug!(url = %url, "skipping unsupported tracker scheme");
                }
            }
        }

        Self { trackers }
    }

    /// Returns true if no usable tracker URL was found.
    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }

    /// Returns the number of usable trackers.
    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    /// Announces to every tracker in order and returns the aggregated
    /// peer set.
    ///
    /// Each tracker's failure progresses to the next; the call fails
    /// with [`TrackerError::AllTrackersFailed`] only when no tracker
    /// answered.
    pub async fn announce(
        &mut self,
        info_hash: &[u8; 20],
        peer_id: &[u8; 20],
        port: u16,
        uploaded: u64,
        downloaded: u64,
        left: u64,
    ) -> Result<Vec<Peer>, TrackerError> {
        let mut peers: Vec<Peer> = Vec::new();
        let mut seen = HashSet::new();
        let mut any_success = false;

        for entry in &mut self.trackers {
            let event = if entry.announced {
                TrackerEvent::None
            } else {
                TrackerEvent::Started
            };

            match entry
                .client
                .announce(info_hash, peer_id, port, uploaded, downloaded, left, event)
                .await
            {
                Ok(response) => {
                    entry.announced = true;
                    entry.contacted = true;
                    any_success = true;

                    debug!(
                        tracker = entry.client.url(),
                        peers = response.peers.len(),
                        "announce ok"
                    );

                    for peer in response.peers {
                        if seen.insert(peer.addr) {
                            peers.push(peer);
                        }
                    }
                }
                Err(e) => {
                    warn!(tracker = entry.client.url(), error = %e, "announce failed");
                }
            }
        }

        if !any_success {
            return Err(TrackerError::AllTrackersFailed);
        }

        Ok(peers)
    }

    /// Sends a terminal event (`stopped` or `completed`) to every
    /// tracker that was successfully contacted during this session.
    ///
    /// Failures are logged and swallowed; shutdown never blocks on a
    /// tracker.
    #[allow(clippy::too_many_arguments)]
    pub async fn announce_event(
        &mut self,
        event: TrackerEvent,
        info_hash: &[u8; 20],
        peer_id: &[u8; 20],
        port: u16,
        uploaded: u64,
        downloaded: u64,
        left: u64,
    ) {
        for entry in &mut self.trackers {
            if !entry.contacted {
                continue;
            }

            if let Err(e) = entry
                .client
                .announce(info_hash, peer_id, port, uploaded, downloaded, left, event)
                .await
            {
                debug!(tracker = entry.client.url(), error = %e, "final announce failed");
            }
        }
    }
}

fn url_encode(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| {
            if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.' || b == b'~' {
                format!("{}", b as char)
            } else {
                format!("%{:02X}", b)
            }
        })
        .collect()
}
