use super::*;
use crate::core::message::{MessageStore, Role};
use crate::core::scroll::ScrollMetrics;
use crate::core::speech::{Voice, VoiceGender};
use crate::utils::test_utils::{create_test_chat_ui, create_test_message, FakeSpeechEngine, TestPlatform};

fn collect_frames(ui: &mut ChatUi, platform: &TestPlatform, key: MessageKey) -> Vec<String> {
    let mut frames = Vec::new();
    while let Some(id) = platform.scheduler.next_tick() {
        if let TickOutcome::Advanced(k) | TickOutcome::Finished(k) = ui.on_tick(id) {
            if k == key {
                frames.push(ui.displayed_text().get(key).unwrap_or_default().to_string());
            }
        }
    }
    frames
}

#[test]
fn end_to_end_reply_is_typed_out_and_scrolled_into_view() {
    let (mut ui, platform) = create_test_chat_ui();
    let mut store = MessageStore::new();

    store.push(create_test_message(Role::User, "What is ibuprofen?", 1000));
    ui.on_message_count_changed(store.len());
    let (token, request) = ui.begin_request();
    assert_eq!(ui.turn_state(), TurnState::Awaiting(request));
    assert!(ui.is_processing());

    let reply = create_test_message(Role::Assistant, "It is a pain reliever.", 2000);
    store.push(reply.clone());
    let scrolls_before = platform.viewport.scroll_calls();
    ui.on_message_count_changed(store.len());
    assert!(ui.complete_request(request, &reply));
    assert_eq!(platform.viewport.scroll_calls(), scrolls_before + 1);
    assert_eq!(ui.turn_state(), TurnState::Typing(MessageKey(2000)));
    assert_eq!(ui.displayed_text().get(MessageKey(2000)), Some(""));

    let frames = collect_frames(&mut ui, &platform, MessageKey(2000));
    assert_eq!(frames[0], "I");
    assert_eq!(frames[1], "It");
    assert_eq!(frames.last().map(String::as_str), Some("It is a pain reliever."));
    assert_eq!(ui.turn_state(), TurnState::Idle);
    assert!(!token.is_cancelled());
    assert_eq!(ui.text_for(&reply), "It is a pain reliever.");
    // The canonical message is never touched by the animation.
    assert_eq!(store.get(MessageKey(2000)), Some(&reply));
}

#[test]
fn stop_all_mid_typing_shows_full_reply() {
    let (mut ui, platform) = create_test_chat_ui();
    let (_, request) = ui.begin_request();
    let reply = create_test_message(Role::Assistant, "Take 200-400 mg every 4-6 hours.", 3000);
    ui.complete_request(request, &reply);

    for id in platform.scheduler.advance(Duration::from_millis(95)) {
        ui.on_tick(id);
    }
    assert_eq!(ui.displayed_text().get(reply.timestamp), Some("Tak"));

    let report = ui.stop_all_processing();
    assert_eq!(report.typing, Some(reply.timestamp));
    assert_eq!(report.request, None);
    assert_eq!(ui.displayed_text().get(reply.timestamp), Some(reply.content.as_str()));
    assert_eq!(ui.turn_state(), TurnState::Idle);
    assert_eq!(platform.scheduler.active_timers(), 0);
}

#[test]
fn stop_all_while_awaiting_cancels_the_request_and_drops_late_replies() {
    let (mut ui, _platform) = create_test_chat_ui();
    let (token, request) = ui.begin_request();

    let report = ui.stop_all_processing();
    assert_eq!(report.request, Some(request));
    assert!(token.is_cancelled());
    assert_eq!(ui.turn_state(), TurnState::Idle);

    let late = create_test_message(Role::Assistant, "too late", 4000);
    assert!(!ui.complete_request(request, &late));
    assert!(!ui.is_typing());
    assert!(ui.displayed_text().get(late.timestamp).is_none());
}

#[test]
fn stop_all_twice_is_harmless() {
    let (mut ui, platform) = create_test_chat_ui();
    assert!(ui.stop_all_processing().is_empty());

    let (_, request) = ui.begin_request();
    ui.speak("Drink water.");
    let reply = create_test_message(Role::Assistant, "Drink water.", 10);
    ui.complete_request(request, &reply);

    assert!(!ui.stop_all_processing().is_empty());
    let displayed = ui.displayed_text().clone();
    assert!(ui.stop_all_processing().is_empty());
    assert_eq!(ui.displayed_text(), &displayed);
    assert_eq!(platform.speech.cancel_calls(), 1);
}

#[test]
fn new_request_finishes_running_animation() {
    let (mut ui, platform) = create_test_chat_ui();
    let (_, first) = ui.begin_request();
    let reply = create_test_message(Role::Assistant, "A long answer about dosage.", 500);
    ui.complete_request(first, &reply);
    if let Some(id) = platform.scheduler.next_tick() {
        ui.on_tick(id);
    }

    let (_, second) = ui.begin_request();
    assert_eq!(ui.turn_state(), TurnState::Awaiting(second));
    assert_eq!(ui.displayed_text().get(reply.timestamp), Some(reply.content.as_str()));
    assert_eq!(platform.scheduler.active_timers(), 0);
}

#[test]
fn failed_request_returns_to_idle_without_typing() {
    let (mut ui, platform) = create_test_chat_ui();
    let (_, request) = ui.begin_request();
    assert!(ui.fail_request(request));
    assert_eq!(ui.turn_state(), TurnState::Idle);
    assert!(!ui.fail_request(request));
    assert_eq!(platform.scheduler.active_timers(), 0);
}

#[test]
fn empty_reply_goes_straight_to_idle() {
    let (mut ui, platform) = create_test_chat_ui();
    let (_, request) = ui.begin_request();
    let reply = create_test_message(Role::Assistant, "", 20);
    assert!(ui.complete_request(request, &reply));
    assert_eq!(ui.turn_state(), TurnState::Idle);
    assert_eq!(ui.text_for(&reply), "");
    assert_eq!(platform.scheduler.active_timers(), 0);
}

#[test]
fn reader_in_scrollback_gets_the_button_instead_of_a_jump() {
    let (mut ui, platform) = create_test_chat_ui();
    ui.on_message_count_changed(2);
    let before = platform.viewport.scroll_calls();

    platform.viewport.set_metrics(ScrollMetrics::new(0.0, 3000.0, 600.0));
    ui.on_scroll();
    assert!(!ui.scroll_state().is_at_bottom);

    assert!(!ui.on_message_count_changed(3));
    assert_eq!(platform.viewport.scroll_calls(), before);
    assert!(ui.show_scroll_button());

    ui.scroll_to_bottom();
    assert_eq!(platform.viewport.scroll_calls(), before + 1);
    platform.viewport.set_metrics(ScrollMetrics::new(2400.0, 3000.0, 600.0));
    ui.on_scroll();
    assert!(!ui.show_scroll_button());
}

#[test]
fn only_the_latest_utterance_completes() {
    let (mut ui, platform) = create_test_chat_ui();
    let SpeakOutcome::Queued(a) = ui.speak("Ibuprofen reduces fever.") else {
        panic!("expected utterance");
    };
    ui.on_speech_event(SpeechEvent::Started(a));
    assert!(ui.is_speaking());

    let SpeakOutcome::Queued(b) = ui.speak("It may upset your stomach.") else {
        panic!("expected utterance");
    };
    assert!(!ui.is_speaking());
    assert!(!ui.on_speech_event(SpeechEvent::Ended(a)));
    ui.on_speech_event(SpeechEvent::Started(b));
    assert!(ui.is_speaking());
    ui.on_speech_event(SpeechEvent::Ended(b));
    assert!(!ui.is_speaking());
    assert_eq!(platform.speech.spoken().len(), 2);
}

#[test]
fn emoji_only_speech_never_starts() {
    let (mut ui, platform) = create_test_chat_ui();
    assert_eq!(ui.speak("🎉🎉🎉"), SpeakOutcome::NothingToSay);
    assert!(!ui.is_speaking());
    assert!(platform.speech.spoken().is_empty());
}

#[test]
fn narrator_uses_preferred_voice_from_engine() {
    let mut platform = TestPlatform::new();
    platform.speech = FakeSpeechEngine::with_voices(vec![
        Voice {
            name: "Alex".into(),
            language: "en-US".into(),
            gender: Some(VoiceGender::Male),
        },
        Voice {
            name: "Karen".into(),
            language: "en-AU".into(),
            gender: None,
        },
    ]);
    let mut ui = platform.build();
    ui.speak("Store below 25°C.");
    let spoken = platform.speech.spoken();
    assert_eq!(spoken[0].voice.as_ref().map(|v| v.name.as_str()), Some("Karen"));
}

#[test]
fn clipboard_failures_are_swallowed() {
    let (mut ui, platform) = create_test_chat_ui();
    assert!(ui.copy_to_clipboard("Paracetamol 500 mg"));
    assert_eq!(platform.clipboard.copied(), vec!["Paracetamol 500 mg".to_string()]);

    let mut failing = TestPlatform::new();
    failing.clipboard = crate::utils::test_utils::FakeClipboard::failing();
    let mut ui = failing.build();
    assert!(!ui.copy_to_clipboard("anything"));
}

#[test]
fn sidebar_and_share_flags_are_plain_toggles() {
    let (mut ui, _platform) = create_test_chat_ui();
    assert!(!ui.is_sidebar_open());
    assert!(ui.toggle_sidebar());
    assert!(!ui.toggle_sidebar());
    ui.set_share_modal_open(true);
    assert!(ui.is_share_modal_open());
    ui.set_sidebar_open(true);
    assert!(ui.is_sidebar_open());
}

#[test]
fn settings_follow_config() {
    let mut config = Config::default();
    config.ui.typing_tick_ms = 15;
    config.speech.rate = 1.1;
    let settings = ChatUiSettings::from(&config);
    assert_eq!(settings.typing_tick, Duration::from_millis(15));
    assert_eq!(settings.speech.rate, 1.1);
    assert_eq!(settings.scroll_button_min_messages, 2);
}

#[test]
fn start_typing_outside_a_request() {
    let (mut ui, platform) = create_test_chat_ui();
    let greeting = create_test_message(Role::Assistant, "Hi! Snap a photo of your medicine.", 1);
    ui.start_typing(&greeting);
    assert_eq!(ui.typing_key(), Some(greeting.timestamp));
    platform.run_ticks(&mut ui);
    assert_eq!(ui.text_for(&greeting), greeting.content);
    assert!(!ui.is_typing());
}

#[test]
fn greeting_typed_while_awaiting_keeps_the_request_alive() {
    let (mut ui, platform) = create_test_chat_ui();
    let (token, request) = ui.begin_request();
    let greeting = create_test_message(Role::Assistant, "Hello there.", 5);
    ui.start_typing(&greeting);
    assert_eq!(ui.turn_state(), TurnState::Awaiting(request));

    platform.run_ticks(&mut ui);
    assert_eq!(ui.text_for(&greeting), greeting.content);
    assert_eq!(ui.turn_state(), TurnState::Awaiting(request));
    assert!(ui.is_processing());
    assert!(!token.is_cancelled());

    let reply = create_test_message(Role::Assistant, "Yes.", 6000);
    assert!(ui.complete_request(request, &reply));
    assert_eq!(ui.turn_state(), TurnState::Typing(reply.timestamp));
    platform.run_ticks(&mut ui);
    assert_eq!(ui.turn_state(), TurnState::Idle);
}

#[test]
fn speech_counts_as_active_before_the_engine_starts() {
    let (mut ui, _platform) = create_test_chat_ui();
    let SpeakOutcome::Queued(id) = ui.speak("Take with food.") else {
        panic!("expected utterance");
    };
    assert!(!ui.is_speaking());
    assert!(ui.is_speech_active());
    ui.on_speech_event(SpeechEvent::Started(id));
    ui.on_speech_event(SpeechEvent::Ended(id));
    assert!(!ui.is_speech_active());
}
