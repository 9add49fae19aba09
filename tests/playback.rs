//! End-to-end playback through the engine into a recording sink.

use std::sync::Arc;

use ps_engine::{PlaybackEngine, RecordingSink, SinkCall};
use ps_ir::{
    semitone_to_cv, DemoContent, MetricTime, NoteEvent, Section, SharedSong, Song, SubrangeLoop,
    Track, QUARTER_NOTE, SIXTEENTH_NOTE,
};

fn engine(song: Song) -> PlaybackEngine<RecordingSink> {
    let tracks = song.num_tracks();
    PlaybackEngine::new(Arc::new(SharedSong::new(song)), tracks, RecordingSink::new())
}

/// Advance in sixteenth-note clocks up to and including `until`, giving
/// each clock 64 samples.
fn run_until(engine: &mut PlaybackEngine<RecordingSink>, from: MetricTime, until: MetricTime) {
    let mut t = from;
    while t <= until {
        engine.update_to_metric_time(t, SIXTEENTH_NOTE, true);
        engine.update_sample_count(64);
        t += SIXTEENTH_NOTE;
    }
}

fn gate_ons(sink: &RecordingSink, track: usize) -> usize {
    sink.transcript()
        .filter(|call| matches!(call, SinkCall::Gate { track: t, on: true, .. } if *t == track))
        .count()
}

fn one_note(pitch: f32, length: MetricTime) -> Track {
    Track::from_notes(&[NoteEvent::new(0.0, 0.5, pitch)], length).unwrap()
}

#[test]
fn tracks_loop_independently() {
    let mut song = Song::with_tracks("mixed", 3);
    song.set_track(0, Track::make_demo(DemoContent::EightQuarterNotes));
    song.set_track(1, Track::make_demo(DemoContent::OneQuarter));
    song.set_track(2, Track::make_demo(DemoContent::Empty));
    let mut engine = engine(song);

    run_until(&mut engine, 0.0, 15.75);

    let sink = engine.sink();
    assert_eq!(gate_ons(sink, 0), 16);
    assert_eq!(gate_ons(sink, 1), 16);
    assert_eq!(gate_ons(sink, 2), 0);
    assert_eq!(engine.current_loop_iteration_start(0), 8.0);
    assert_eq!(engine.current_loop_iteration_start(1), 15.0);
}

#[test]
fn scale_pitches_arrive_in_order() {
    let mut engine = engine(Song::make_demo(DemoContent::EightQuarterNotes, 1));
    let mut pitches = Vec::new();
    for beat in 0..8 {
        let t = beat as MetricTime * QUARTER_NOTE;
        engine.update_to_metric_time(t, SIXTEENTH_NOTE, true);
        engine.update_sample_count(64);
        pitches.push(engine.sink().cv(0, 0));
    }
    let expected: Vec<Option<f32>> = [60, 62, 64, 65, 67, 69, 71, 72]
        .iter()
        .map(|&n| Some(semitone_to_cv(n)))
        .collect();
    assert_eq!(pitches, expected);
}

#[test]
fn touching_notes_leave_a_gap() {
    let mut engine = engine(Song::make_demo(DemoContent::FourTouchingQuarters, 1));
    engine.set_sample_count_for_retrigger(100);

    engine.update_to_metric_time(0.0, SIXTEENTH_NOTE, true);
    assert!(engine.sink().gate(0, 0));

    engine.update_to_metric_time(1.0, SIXTEENTH_NOTE, true);
    assert!(!engine.sink().gate(0, 0));
    engine.update_sample_count(99);
    assert!(!engine.sink().gate(0, 0));
    engine.update_sample_count(1);
    assert!(engine.sink().gate(0, 0));
    assert_eq!(engine.sink().cv(0, 0), Some(semitone_to_cv(62)));
}

#[test]
fn almost_touching_notes_do_not_retrigger() {
    let mut engine = engine(Song::make_demo(DemoContent::FourAlmostTouchingQuarters, 1));
    engine.set_sample_count_for_retrigger(100);

    // at quarter-note quantization the .95 notes end at the next beat
    engine.update_to_metric_time(0.0, QUARTER_NOTE, true);
    engine.update_to_metric_time(1.0, QUARTER_NOTE, true);
    assert!(!engine.sink().gate(0, 0));

    // at a finer grid they end just before it
    let fine = 1.0 / 64.0;
    let mut engine = self::engine(Song::make_demo(DemoContent::FourAlmostTouchingQuarters, 1));
    engine.set_sample_count_for_retrigger(100);
    engine.update_to_metric_time(0.0, fine, true);
    engine.update_to_metric_time(0.953125, fine, true);
    assert!(!engine.sink().gate(0, 0));
    engine.update_to_metric_time(1.0, fine, true);
    assert!(engine.sink().gate(0, 0));
}

#[test]
fn sections_advance_after_their_repeat_count() {
    let mut song = Song::with_tracks("sections", 1);
    song.set_section(0, 0, Some(Section::new("A", one_note(1.0, 1.0)).with_repeat_count(2)));
    song.set_section(0, 1, Some(Section::new("B", one_note(3.0, 1.0))));
    let mut engine = engine(song);

    let mut heard = Vec::new();
    let mut sections = Vec::new();
    for beat in 0..6 {
        engine.update_to_metric_time(beat as MetricTime, SIXTEENTH_NOTE, true);
        engine.update_sample_count(64);
        heard.push(engine.sink().cv(0, 0));
        sections.push(engine.get_section(0));
    }
    assert_eq!(
        heard,
        vec![Some(1.0), Some(1.0), Some(3.0), Some(1.0), Some(1.0), Some(3.0)]
    );
    assert_eq!(sections, vec![1, 1, 2, 1, 1, 2]);
}

#[test]
fn section_request_waits_for_end_of_loop() {
    let mut song = Song::with_tracks("request", 1);
    song.set_section(0, 0, Some(Section::new("A", one_note(1.0, 2.0)).with_repeat_count(0)));
    song.set_section(0, 1, Some(Section::new("B", one_note(3.0, 2.0))));
    let mut engine = engine(song);

    run_until(&mut engine, 0.0, 0.5);
    engine.set_next_section_request(0, 2);
    assert_eq!(engine.get_next_section_request(0), 2);

    run_until(&mut engine, 0.75, 1.75);
    assert_eq!(engine.get_section(0), 1);
    assert_eq!(engine.sink().cv(0, 0), Some(1.0));

    run_until(&mut engine, 2.0, 2.0);
    assert_eq!(engine.get_section(0), 2);
    assert_eq!(engine.get_next_section_request(0), 0);
    assert_eq!(engine.sink().cv(0, 0), Some(3.0));
}

#[test]
fn request_for_empty_section_falls_through() {
    let mut song = Song::with_tracks("fallthrough", 1);
    song.set_section(0, 0, Some(Section::new("A", one_note(1.0, 1.0)).with_repeat_count(0)));
    song.set_section(0, 2, Some(Section::new("C", one_note(5.0, 1.0))));
    let mut engine = engine(song);
    run_until(&mut engine, 0.0, 0.0);

    // section 2 is missing, so the request moves on to section 3
    engine.set_next_section_request(0, 2);
    assert_eq!(engine.get_next_section_request(0), 3);
}

#[test]
fn subrange_loop_repeats_the_middle() {
    let mut track = Track::make_demo(DemoContent::EightQuarterNotes);
    track.set_subrange_loop(SubrangeLoop::new(true, 2.0, 4.0));
    let mut song = Song::with_tracks("subrange", 1);
    song.set_track(0, track);
    let mut engine = engine(song);

    let mut heard = Vec::new();
    for beat in 0..4 {
        engine.update_to_metric_time(beat as MetricTime, SIXTEENTH_NOTE, true);
        engine.update_sample_count(64);
        heard.push(engine.sink().cv(0, 0));
    }
    let expected: Vec<Option<f32>> = [64, 65, 64, 65]
        .iter()
        .map(|&n| Some(semitone_to_cv(n)))
        .collect();
    assert_eq!(heard, expected);
}

#[test]
fn polyphony_spreads_chords_across_voices() {
    let chord = [
        NoteEvent::new(0.0, 1.0, semitone_to_cv(60)),
        NoteEvent::new(0.0, 1.0, semitone_to_cv(64)),
        NoteEvent::new(0.0, 1.0, semitone_to_cv(67)),
    ];
    let mut song = Song::with_tracks("chord", 1);
    song.set_track(0, Track::from_notes(&chord, 4.0).unwrap());
    let mut engine = engine(song);
    engine.set_num_voices(0, 4);

    run_until(&mut engine, 0.0, 0.5);
    assert_eq!(engine.sink().open_gates(0), 3);

    run_until(&mut engine, 0.75, 1.0);
    assert_eq!(engine.sink().open_gates(0), 0);
}
