//! Provider resolution tests
//!
//! classify() must be pure and reject anything it cannot attribute to a
//! known provider.

use streamwatch::provider::{classify, Provider, ResolveError};

#[test]
fn test_twitch_channel() {
    let resolved = classify("https://twitch.tv/somechannel").unwrap();
    assert_eq!(resolved.provider, Provider::Twitch);
    assert_eq!(resolved.display_name, "somechannel");
}

#[test]
fn test_first_path_segment_only() {
    let resolved = classify("https://www.twitch.tv/x/y").unwrap();
    assert_eq!(resolved.display_name, "x");
}

#[test]
fn test_rejections() {
    assert_eq!(classify("not a url"), Err(ResolveError::InvalidUrl));
    assert_eq!(classify(""), Err(ResolveError::InvalidUrl));
    assert_eq!(classify("twitch.tv/somechannel"), Err(ResolveError::InvalidUrl));
    assert_eq!(
        classify("https://example.com/x"),
        Err(ResolveError::UnsupportedHost)
    );
}

#[test]
fn test_www_and_case_give_same_identity() {
    let a = classify("https://www.twitch.tv/somechannel").unwrap();
    let b = classify("HTTPS://Twitch.TV/somechannel").unwrap();
    assert_eq!(a.url, b.url);
}

#[test]
fn test_query_and_fragment_are_dropped() {
    let resolved = classify("https://twitch.tv/somechannel?referrer=raid#chat").unwrap();
    assert_eq!(resolved.url, "https://twitch.tv/somechannel");
}

/// Same input, same answer, for every kind of input
#[test]
fn test_classify_is_deterministic() {
    let inputs = [
        "https://twitch.tv/somechannel",
        "https://www.twitch.tv/x/y",
        "not a url",
        "https://example.com/x",
        "",
        "ftp://twitch.tv/a",
        "https://m.twitch.tv/a",
        "https://twitch.tv/",
    ];
    for input in inputs {
        assert_eq!(classify(input), classify(input), "input: {:?}", input);
    }
}

#[test]
fn test_subdomains_resolve_to_twitch() {
    let resolved = classify("https://m.twitch.tv/somechannel").unwrap();
    assert_eq!(resolved.provider, Provider::Twitch);
    assert_eq!(resolved.url, "https://m.twitch.tv/somechannel");
}
