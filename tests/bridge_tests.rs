//! Session bridge scenarios driven through scripted channels.

mod common;

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use common::{
    Command, CommandLog, FakeAssistant, FakeCaller, INTRODUCTION, SessionOptionsSummary,
    bridge_settings,
};
use voice_bridge::core::assistant::{AudioFormat, RealtimeVoice};
use voice_bridge::core::bridge::SessionBridge;
use voice_bridge::core::events::{AssistantEvent, CallerEvent};
use voice_bridge::errors::bridge_error::BridgeError;

async fn started_bridge(log: &CommandLog) -> (SessionBridge, common::AssistantFeed) {
    let (assistant, feed) = FakeAssistant::new(log);
    let bridge = SessionBridge::start("CA100", Box::new(assistant), bridge_settings())
        .await
        .unwrap();
    (bridge, feed)
}

fn configured() -> Command {
    Command::AssistantConfigure(SessionOptionsSummary {
        voice: RealtimeVoice::Sage,
        audio_format: AudioFormat::G711Ulaw,
    })
}

#[tokio::test]
async fn test_start_fails_with_connect_error() {
    let log = CommandLog::new();
    let (assistant, _feed) =
        FakeAssistant::failing(&log, BridgeError::Connect("refused".to_string()));

    let result = SessionBridge::start("CA100", Box::new(assistant), bridge_settings()).await;
    assert!(matches!(result, Err(BridgeError::Connect(_))));
    assert!(log.commands().is_empty());
}

#[tokio::test]
async fn test_stream_start_configures_then_introduces() {
    let log = CommandLog::new();
    let (mut bridge, _feed) = started_bridge(&log).await;
    let (caller, _caller_feed) = FakeCaller::new(&log);
    bridge.attach_caller(Box::new(caller)).unwrap();

    bridge
        .on_caller_event(CallerEvent::StreamStart {
            stream_id: "MZ1".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(bridge.context().stream_id.as_deref(), Some("MZ1"));
    assert_eq!(
        log.commands(),
        vec![
            Command::AssistantConnect,
            configured(),
            Command::AssistantSpeak(INTRODUCTION.to_string()),
        ]
    );
}

#[tokio::test]
async fn test_audio_relayed_verbatim_both_ways() {
    let log = CommandLog::new();
    let (mut bridge, _feed) = started_bridge(&log).await;
    let (caller, _caller_feed) = FakeCaller::new(&log);
    bridge.attach_caller(Box::new(caller)).unwrap();

    bridge
        .on_caller_event(CallerEvent::Media {
            payload: "fn5+fg==".into(),
        })
        .await
        .unwrap();
    bridge
        .on_assistant_event(AssistantEvent::AudioDelta {
            payload: "//79/A==".into(),
        })
        .await
        .unwrap();

    assert_eq!(
        &log.commands()[1..],
        &[
            Command::AssistantAudio("fn5+fg==".to_string()),
            Command::CallerAudio("//79/A==".to_string()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_barge_in_truncates_to_heard_duration() {
    let log = CommandLog::new();
    let (mut bridge, _feed) = started_bridge(&log).await;
    let (caller, _caller_feed) = FakeCaller::new(&log);
    bridge.attach_caller(Box::new(caller)).unwrap();

    bridge
        .on_assistant_event(AssistantEvent::ItemCreated {
            item_id: "item_A".to_string(),
        })
        .await
        .unwrap();
    bridge
        .on_assistant_event(AssistantEvent::SpeechStopped { audio_end_ms: 1600 })
        .await
        .unwrap();

    tokio::time::advance(Duration::from_millis(2000)).await;
    bridge
        .on_assistant_event(AssistantEvent::SpeechStarted)
        .await
        .unwrap();

    assert_eq!(
        &log.commands()[1..],
        &[
            Command::AssistantClear,
            Command::CallerClear,
            Command::AssistantTruncate {
                item_id: "item_A".to_string(),
                heard_ms: 400,
            },
        ]
    );
}

/// Timeline: item at 500ms, VAD stop reported at 1600ms with
/// `audio_end_ms = 1200`, caller speaks again at 2000ms. The heard duration is
/// `elapsed_ms - last_speech_stop_ms` = 2000 - 1200 = 800.
#[tokio::test(start_paused = true)]
async fn test_barge_in_replays_reference_timeline() {
    let log = CommandLog::new();
    let (mut bridge, _feed) = started_bridge(&log).await;
    let (caller, _caller_feed) = FakeCaller::new(&log);
    bridge.attach_caller(Box::new(caller)).unwrap();

    tokio::time::advance(Duration::from_millis(500)).await;
    bridge
        .on_assistant_event(AssistantEvent::ItemCreated {
            item_id: "a1".to_string(),
        })
        .await
        .unwrap();

    tokio::time::advance(Duration::from_millis(1100)).await;
    bridge
        .on_assistant_event(AssistantEvent::SpeechStopped { audio_end_ms: 1200 })
        .await
        .unwrap();

    tokio::time::advance(Duration::from_millis(400)).await;
    bridge
        .on_assistant_event(AssistantEvent::SpeechStarted)
        .await
        .unwrap();

    assert_eq!(
        &log.commands()[1..],
        &[
            Command::AssistantClear,
            Command::CallerClear,
            Command::AssistantTruncate {
                item_id: "a1".to_string(),
                heard_ms: 800,
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_barge_in_clamps_negative_heard_duration() {
    let log = CommandLog::new();
    let (mut bridge, _feed) = started_bridge(&log).await;
    let (caller, _caller_feed) = FakeCaller::new(&log);
    bridge.attach_caller(Box::new(caller)).unwrap();

    bridge
        .on_assistant_event(AssistantEvent::ItemCreated {
            item_id: "item_B".to_string(),
        })
        .await
        .unwrap();
    // The VAD reports a stop later than our own clock.
    bridge
        .on_assistant_event(AssistantEvent::SpeechStopped { audio_end_ms: 5000 })
        .await
        .unwrap();
    tokio::time::advance(Duration::from_millis(1000)).await;
    bridge
        .on_assistant_event(AssistantEvent::SpeechStarted)
        .await
        .unwrap();

    assert_eq!(
        log.commands().last(),
        Some(&Command::AssistantTruncate {
            item_id: "item_B".to_string(),
            heard_ms: 0,
        })
    );
}

#[tokio::test]
async fn test_barge_in_without_item_skips_truncate() {
    let log = CommandLog::new();
    let (mut bridge, _feed) = started_bridge(&log).await;
    let (caller, _caller_feed) = FakeCaller::new(&log);
    bridge.attach_caller(Box::new(caller)).unwrap();

    bridge
        .on_assistant_event(AssistantEvent::SpeechStarted)
        .await
        .unwrap();

    assert_eq!(
        &log.commands()[1..],
        &[Command::AssistantClear, Command::CallerClear]
    );
}

#[tokio::test]
async fn test_transcript_is_not_forwarded() {
    let log = CommandLog::new();
    let (mut bridge, _feed) = started_bridge(&log).await;
    let (caller, _caller_feed) = FakeCaller::new(&log);
    bridge.attach_caller(Box::new(caller)).unwrap();

    bridge
        .on_assistant_event(AssistantEvent::TranscriptDone {
            text: "How can I help?".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(log.commands(), vec![Command::AssistantConnect]);
}

#[tokio::test]
async fn test_attach_requires_open_assistant() {
    let log = CommandLog::new();
    let (mut bridge, _feed) = started_bridge(&log).await;
    bridge.close().await.unwrap();

    let (caller, _caller_feed) = FakeCaller::new(&log);
    assert_eq!(
        bridge.attach_caller(Box::new(caller)),
        Err(BridgeError::SessionNotReady)
    );
}

#[tokio::test]
async fn test_second_caller_is_rejected() {
    let log = CommandLog::new();
    let (mut bridge, _feed) = started_bridge(&log).await;
    let (first, _first_feed) = FakeCaller::new(&log);
    let (second, _second_feed) = FakeCaller::new(&log);

    bridge.attach_caller(Box::new(first)).unwrap();
    assert_eq!(
        bridge.attach_caller(Box::new(second)),
        Err(BridgeError::AlreadyConnected)
    );
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let log = CommandLog::new();
    let (mut bridge, _feed) = started_bridge(&log).await;
    let (caller, _caller_feed) = FakeCaller::new(&log);
    bridge.attach_caller(Box::new(caller)).unwrap();

    bridge.close().await.unwrap();
    bridge.close().await.unwrap();

    assert!(bridge.is_closed());
    assert_eq!(log.count(&Command::AssistantClose), 1);
    assert_eq!(log.count(&Command::CallerClose), 1);
}

#[tokio::test]
async fn test_run_requires_attached_caller() {
    let log = CommandLog::new();
    let (mut bridge, _feed) = started_bridge(&log).await;

    let result = bridge.run(CancellationToken::new()).await;
    assert_eq!(result, Err(BridgeError::SessionNotReady));
}

#[tokio::test]
async fn test_run_ends_when_caller_hangs_up() {
    let log = CommandLog::new();
    let (mut bridge, _assistant_feed) = started_bridge(&log).await;
    let (caller, caller_feed) = FakeCaller::new(&log);
    bridge.attach_caller(Box::new(caller)).unwrap();

    caller_feed.start("MZ7");
    caller_feed.media("AAAA");
    caller_feed.media("BBBB");
    caller_feed.hang_up();

    bridge.run(CancellationToken::new()).await.unwrap();

    assert_eq!(
        log.commands(),
        vec![
            Command::AssistantConnect,
            configured(),
            Command::AssistantSpeak(INTRODUCTION.to_string()),
            Command::AssistantAudio("AAAA".to_string()),
            Command::AssistantAudio("BBBB".to_string()),
            Command::CallerClose,
            Command::AssistantClose,
        ]
    );
}

#[tokio::test]
async fn test_run_skips_protocol_errors() {
    let log = CommandLog::new();
    let (mut bridge, _assistant_feed) = started_bridge(&log).await;
    let (caller, caller_feed) = FakeCaller::new(&log);
    bridge.attach_caller(Box::new(caller)).unwrap();

    caller_feed.send(Err(BridgeError::Protocol("bad frame".to_string())));
    caller_feed.media("AAAA");
    caller_feed.hang_up();

    bridge.run(CancellationToken::new()).await.unwrap();
    assert_eq!(log.count(&Command::AssistantAudio("AAAA".to_string())), 1);
}

#[tokio::test]
async fn test_run_tears_down_on_assistant_channel_error() {
    let log = CommandLog::new();
    let (mut bridge, assistant_feed) = started_bridge(&log).await;
    let (caller, _caller_feed) = FakeCaller::new(&log);
    bridge.attach_caller(Box::new(caller)).unwrap();

    assistant_feed.send(Err(BridgeError::Channel("socket reset".to_string())));

    let result = bridge.run(CancellationToken::new()).await;
    assert_eq!(result, Err(BridgeError::Channel("socket reset".to_string())));
    assert!(bridge.is_closed());
    assert_eq!(log.count(&Command::CallerClose), 1);
    assert_eq!(log.count(&Command::AssistantClose), 1);
}

#[tokio::test]
async fn test_run_stops_on_cancellation() {
    let log = CommandLog::new();
    let (mut bridge, _assistant_feed) = started_bridge(&log).await;
    let (caller, _caller_feed) = FakeCaller::new(&log);
    bridge.attach_caller(Box::new(caller)).unwrap();

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            let result = bridge.run(shutdown).await;
            (bridge, result)
        }
    });

    shutdown.cancel();
    let (bridge, result) = handle.await.unwrap();
    assert!(result.is_ok());
    assert!(bridge.is_closed());
    assert_eq!(log.count(&Command::AssistantClose), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_caller_clear_still_truncates() {
    let log = CommandLog::new();
    let (mut bridge, _feed) = started_bridge(&log).await;
    let (caller, _caller_feed) = FakeCaller::unaddressed(&log);
    bridge.attach_caller(Box::new(caller)).unwrap();

    bridge
        .on_assistant_event(AssistantEvent::ItemCreated {
            item_id: "item_C".to_string(),
        })
        .await
        .unwrap();
    bridge
        .on_assistant_event(AssistantEvent::SpeechStopped { audio_end_ms: 100 })
        .await
        .unwrap();
    tokio::time::advance(Duration::from_millis(300)).await;

    // The caller side cannot be cleared yet; that must not skip the truncate.
    bridge
        .on_assistant_event(AssistantEvent::SpeechStarted)
        .await
        .unwrap();

    assert_eq!(
        &log.commands()[1..],
        &[
            Command::AssistantClear,
            Command::AssistantTruncate {
                item_id: "item_C".to_string(),
                heard_ms: 200,
            },
        ]
    );
    assert!(!bridge.is_closed());
}
