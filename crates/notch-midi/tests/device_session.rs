use notch_midi::{
    BackendSelector, ControlMessage, DeviceDir, DeviceError, DeviceSession, DeviceTarget,
    LoopbackBackend, PresetStore, RawMidiBackend, RetryPolicy,
};
use std::fs;

#[test]
fn unknown_target_leaves_session_closed() {
    let backend = LoopbackBackend::new(["Virtual Synth"]);
    let capture = backend.capture();
    let session = DeviceSession::new(BackendSelector::new(
        vec![Box::new(backend)],
        RetryPolicy::immediate(),
    ));

    let unknown = DeviceTarget {
        backend: "loopback".into(),
        index: 3,
        name: "Nonexistent".into(),
    };
    assert!(matches!(
        session.open(&unknown),
        Err(DeviceError::TargetNotFound(_))
    ));
    assert!(!session.is_open());

    let result = session.send_control(
        1,
        ControlMessage::ControlChange {
            controller: 1,
            value: 1,
        },
    );
    assert!(matches!(result, Err(DeviceError::NotConnected)));
    assert!(capture.is_empty());
}

#[test]
fn closed_session_never_transmits() {
    let backend = LoopbackBackend::new(["A"]);
    let capture = backend.capture();
    let session = DeviceSession::new(BackendSelector::new(
        vec![Box::new(backend)],
        RetryPolicy::immediate(),
    ));

    for channel in [1, 16] {
        for message in [
            ControlMessage::NoteOn {
                note: 60,
                velocity: 90,
            },
            ControlMessage::NoteOff { note: 60 },
        ] {
            assert!(matches!(
                session.send_control(channel, message),
                Err(DeviceError::NotConnected)
            ));
        }
    }

    session.open_by_name("A").unwrap();
    session.close();
    assert!(matches!(
        session.send_control(1, ControlMessage::NoteOff { note: 60 }),
        Err(DeviceError::NotConnected)
    ));
    assert!(capture.is_empty());
}

#[test]
fn raw_midi_node_receives_preset_messages() {
    let dev = tempfile::tempdir().unwrap();
    let node = dev.path().join("midiC1D0");
    fs::write(&node, b"").unwrap();

    let selector = BackendSelector::new(
        vec![Box::new(RawMidiBackend::with_dirs(vec![DeviceDir::new(
            dev.path(),
            "midiC",
        )]))],
        RetryPolicy::immediate(),
    );
    let session = DeviceSession::new(selector);
    let target = session.open_by_name("midiC1D0").unwrap();
    assert_eq!(target.backend, "rawmidi");

    let presets_path = dev.path().join("presets.json");
    fs::write(
        &presets_path,
        r#"{"presets":[{"name":"Kick","channel":10,"note":36,"velocity":127,"cc":74,"cc_value":20}],"last_channel":99}"#,
    )
    .unwrap();
    let store = PresetStore::load(&presets_path).unwrap();
    assert_eq!(store.last_channel().number(), 16);

    let kick = store.find("Kick").unwrap();
    for message in [kick.note_on(), kick.control_change(), kick.note_off()] {
        session.send_control(kick.channel, message).unwrap();
    }
    session.close();

    assert_eq!(
        fs::read(&node).unwrap(),
        vec![0x99, 36, 127, 0xB9, 74, 20, 0x89, 36, 0]
    );
}

#[test]
fn presets_survive_a_round_trip_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("midi_presets.json");

    let mut store = PresetStore::load(&path).unwrap();
    assert!(store.is_empty());
    assert_eq!(store.last_channel().number(), 1);

    store
        .save(notch_midi::MidiPreset {
            name: String::new(),
            channel: 3,
            note: 64,
            velocity: 80,
            control_number: 1,
            control_value: 0,
        })
        .unwrap();
    store.set_last_channel(notch_midi::Channel::new(3).unwrap());
    store.persist().unwrap();

    let reloaded = PresetStore::load(&path).unwrap();
    assert_eq!(reloaded.presets(), store.presets());
    assert_eq!(reloaded.presets()[0].name, "Preset 1");
    assert_eq!(reloaded.last_channel().number(), 3);
}
