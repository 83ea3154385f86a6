//! Twitch channel status
//!
//! `GET {api}/streams/{channel}` answers with `{"stream": {...}}` where the
//! stream object is null while the channel is offline.

use serde::Deserialize;

use super::RefreshError;
use crate::models::ChannelStatus;
use crate::provider::ProviderDescriptor;

pub static DESCRIPTOR: ProviderDescriptor = ProviderDescriptor {
    name: "Twitch",
    host_suffix: "twitch.tv",
    default_api_url: "https://api.twitch.tv/kraken",
    client_id_header: Some("Client-ID"),
    status_path,
    parse_status,
};

/// Streams endpoint response
#[derive(Debug, Deserialize)]
struct StreamsResponse {
    #[serde(default)]
    stream: Option<LiveStream>,
}

/// The live stream object, present only while online
#[derive(Debug, Deserialize)]
struct LiveStream {
    viewers: u64,
}

fn status_path(channel: &str) -> String {
    format!("/streams/{}", urlencoding::encode(channel))
}

fn parse_status(body: &str) -> Result<ChannelStatus, RefreshError> {
    let response: StreamsResponse = serde_json::from_str(body)
        .map_err(|e| RefreshError::InvalidResponse(format!("JSON parse error: {}", e)))?;

    Ok(match response.stream {
        Some(stream) => ChannelStatus::Live {
            viewers: stream.viewers,
        },
        None => ChannelStatus::Offline,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_path_encodes_channel() {
        assert_eq!(status_path("somechannel"), "/streams/somechannel");
        assert_eq!(status_path("a b"), "/streams/a%20b");
    }

    #[test]
    fn test_parse_live() {
        let body = r#"{"stream": {"viewers": 1337, "game": "Chess"}}"#;
        assert_eq!(
            parse_status(body).unwrap(),
            ChannelStatus::Live { viewers: 1337 }
        );
    }

    #[test]
    fn test_parse_offline() {
        assert_eq!(
            parse_status(r#"{"stream": null}"#).unwrap(),
            ChannelStatus::Offline
        );
        assert_eq!(parse_status("{}").unwrap(), ChannelStatus::Offline);
    }

    #[test]
    fn test_parse_rejects_bad_viewers() {
        assert!(parse_status(r#"{"stream": {"viewers": -3}}"#).is_err());
        assert!(parse_status(r#"{"stream": {"viewers": "many"}}"#).is_err());
        assert!(parse_status(r#"{"stream": {}}"#).is_err());
        assert!(parse_status("<html>").is_err());
    }
}
