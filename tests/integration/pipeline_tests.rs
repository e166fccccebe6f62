//! Integration tests for the acquisition → smoothing → fan → publication
//! pipeline, built through `Pipeline::build` exactly as `main` does but
//! with mock buses, actuators and publishers.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use sensett::app::events::AppEvent;
use sensett::app::pipeline::Pipeline;
use sensett::app::ports::{ConfigError, SensorPort};
use sensett::control::{FanDecision, FanState};
use sensett::error::{Error, PublishError, SensorError};
use sensett::scheduler::{Schedule, spawn_loop};
use sensett::sensors::{
    AIR_QUALITY, HUMIDITY, Readings, SensorDescriptor, TEMPERATURE, create_driver, sgp40, sht31,
};
use serde_json::json;

use crate::mock_hw::{
    MockI2c, MockPublisher, NoopDelay, RecordingActuator, RecordingSink, ScriptedSensor, config,
    fan_above, group, sensor, sgp40_frame, sht31_frame,
};

/// Open every sensor on its own mock bus with the real driver.
fn build_on_mock_buses(cfg: &sensett::config::SystemConfig) -> (Pipeline, HashMap<String, MockI2c>) {
    let mut buses = HashMap::new();
    let pipeline = Pipeline::build(cfg, |d: &SensorDescriptor| {
        let bus = MockI2c::new();
        buses.insert(d.name.clone(), bus.clone());
        Ok(create_driver(d.kind, d.address, bus, NoopDelay::default()))
    })
    .unwrap();
    (pipeline, buses)
}

/// Open every sensor as a scripted port.
fn build_scripted(
    cfg: &sensett::config::SystemConfig,
) -> (Pipeline, HashMap<String, ScriptedSensor>) {
    let mut ports = HashMap::new();
    let pipeline = Pipeline::build(cfg, |d: &SensorDescriptor| {
        let port = ScriptedSensor::new(d.kind.quantities(), d.kind.compensation_inputs());
        ports.insert(d.name.clone(), port.clone());
        Ok(Box::new(port) as Box<dyn SensorPort>)
    })
    .unwrap();
    (pipeline, ports)
}

fn th(celsius: f32, rh: f32) -> Readings {
    Readings::new().with(TEMPERATURE, celsius).with(HUMIDITY, rh)
}

// ── End-to-end: SHT31 + SGP40 with a fan on temperature ──────

#[test]
fn gas_sensor_waits_for_peer_then_fan_switches_once() {
    // The gas sensor is listed first, so on the first tick its peer has no
    // smoothed values yet.
    let cfg = config(
        vec![sensor("voc", "SGP40"), sensor("chamber", "SHT31")],
        vec![group("Chamber", &["chamber", "voc"])],
        Some(fan_above("chamber", 30.0)),
    );
    let (pipeline, buses) = build_on_mock_buses(&cfg);
    let actuator = RecordingActuator::new();
    let mut acq = pipeline.acquisition(actuator.clone());
    let mut sink = RecordingSink::new();

    buses["chamber"].queue(sht31_frame(31.0, 50.0));
    buses["voc"].queue(sgp40_frame(30_000));

    let report = acq.tick(&mut sink);
    assert_eq!(report.waiting, 1);
    assert_eq!(report.sampled, 1);
    assert_eq!(report.fan, Some(FanDecision::Switched(FanState::On)));

    let registry = pipeline.registry();
    assert_eq!(registry.by_name("voc").and_then(|s| s.value(AIR_QUALITY)), None);
    assert!(buses["voc"].writes().is_empty(), "no uncompensated read");
    assert_eq!(actuator.calls(), [("exhaust".to_string(), FanState::On)]);

    // Second tick: the gas sensor is compensated with the smoothed values.
    buses["chamber"].queue(sht31_frame(31.0, 50.0));
    let report = acq.tick(&mut sink);
    assert_eq!(report.sampled, 2);
    assert_eq!(report.fan, Some(FanDecision::Unchanged(FanState::On)));

    let voc_writes = buses["voc"].writes();
    assert_eq!(voc_writes.len(), 1);
    let (addr, cmd) = &voc_writes[0];
    assert_eq!(*addr, sgp40::DEFAULT_ADDRESS);
    assert_eq!(cmd[..2], [0x26, 0x0F]);
    assert_eq!(
        cmd[..],
        sgp40::measure_command(
            registry.by_name("chamber").and_then(|s| s.value(HUMIDITY)).unwrap(),
            registry.by_name("chamber").and_then(|s| s.value(TEMPERATURE)).unwrap(),
        )
    );
    assert_eq!(registry.by_name("voc").and_then(|s| s.value(AIR_QUALITY)), Some(30_000.0));

    // Exactly one fan command over both ticks.
    assert_eq!(actuator.calls().len(), 1);
    assert_eq!(acq.fan_state(), Some(FanState::On));

    let publisher = MockPublisher::new();
    let mut publ = pipeline.publication(publisher.clone());
    assert_eq!(publ.tick(&mut sink), 1);
    assert_eq!(
        publisher.messages(),
        [(
            "sensor/chamber".to_string(),
            json!({"temp": 31.0, "hum": 50.0, "aqi": 30000.0})
        )]
    );
}

#[test]
fn peer_sampled_earlier_in_same_tick_compensates_immediately() {
    let cfg = config(
        vec![sensor("chamber", "SHT31"), sensor("voc", "SGP40")],
        vec![group("chamber", &["chamber", "voc"])],
        None,
    );
    let (pipeline, buses) = build_on_mock_buses(&cfg);
    let mut acq = pipeline.acquisition(RecordingActuator::new());
    let mut sink = RecordingSink::new();

    buses["chamber"].queue(sht31_frame(22.0, 40.0));
    buses["voc"].queue(sgp40_frame(25_000));

    let report = acq.tick(&mut sink);
    assert_eq!(report.sampled, 2);
    assert_eq!(report.fan, None);
    assert_eq!(
        pipeline.registry().by_name("voc").and_then(|s| s.value(AIR_QUALITY)),
        Some(25_000.0)
    );
}

#[test]
fn gas_sensor_without_peer_is_never_read() {
    let cfg = config(
        vec![sensor("chamber", "SHT31"), sensor("voc", "SGP40")],
        // Different groups: no compensation peer.
        vec![group("a", &["chamber"]), group("b", &["voc"])],
        None,
    );
    let (pipeline, ports) = build_scripted(&cfg);
    assert!(pipeline.compensation().bindings(1).is_empty());

    let mut acq = pipeline.acquisition(RecordingActuator::new());
    let mut sink = RecordingSink::new();
    for _ in 0..3 {
        ports["chamber"].queue(th(20.0, 40.0));
        ports["voc"].queue(Readings::new().with(AIR_QUALITY, 1.0));
        acq.tick(&mut sink);
    }
    assert_eq!(ports["voc"].calls(), 0);
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::CompensationMissing { input, .. } if *input == TEMPERATURE)),
        3
    );

    let publisher = MockPublisher::new();
    pipeline.publication(publisher.clone()).tick(&mut sink);
    let messages = publisher.messages();
    assert_eq!(messages[1], ("sensor/b".to_string(), json!({"aqi": null})));
}

#[test]
fn compensation_binds_first_peer_in_registry_order() {
    let cfg = config(
        vec![
            sensor("first", "SHT31"),
            sensor("voc", "SGP40"),
            sensor("second", "SHT31"),
        ],
        vec![group("g", &["second", "voc", "first"])],
        None,
    );
    let (pipeline, ports) = build_scripted(&cfg);
    let bindings = pipeline.compensation().bindings(1);
    assert_eq!(bindings.len(), 2);
    assert!(bindings.iter().all(|b| b.peer == 0));

    let mut acq = pipeline.acquisition(RecordingActuator::new());
    ports["first"].queue(th(20.0, 40.0));
    ports["second"].queue(th(30.0, 60.0));
    ports["voc"].queue(Readings::new().with(AIR_QUALITY, 1.0));
    acq.tick(&mut RecordingSink::new());

    let inputs = ports["voc"].last_inputs().unwrap();
    assert_eq!(inputs.get(TEMPERATURE), Some(20.0));
    assert_eq!(inputs.get(HUMIDITY), Some(40.0));
}

// ── Failure isolation ─────────────────────────────────────────

#[test]
fn one_sensor_failure_does_not_stop_others() {
    let cfg = config(
        vec![sensor("broken", "SHT31"), sensor("healthy", "SHT31")],
        vec![group("all", &["broken", "healthy"])],
        None,
    );
    let (pipeline, buses) = build_on_mock_buses(&cfg);
    buses["broken"].set_nack(true);
    buses["healthy"].queue(sht31_frame(21.0, 45.0));

    let mut acq = pipeline.acquisition(RecordingActuator::new());
    let mut sink = RecordingSink::new();
    let report = acq.tick(&mut sink);

    assert_eq!(report.partial, 1);
    assert_eq!(report.sampled, 1);
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::SensorSkipped { sensor, undefined: 2 } if sensor == "broken")),
        1
    );
    let registry = pipeline.registry();
    assert_eq!(registry.by_name("broken").and_then(|s| s.value(TEMPERATURE)), None);
    let t = registry.by_name("healthy").and_then(|s| s.value(TEMPERATURE)).unwrap();
    assert!((t - 21.0).abs() < 0.01);
}

#[test]
fn corrupt_word_only_drops_that_quantity() {
    let cfg = config(vec![sensor("chamber", "SHT31")], vec![], None);
    let (pipeline, buses) = build_on_mock_buses(&cfg);
    let mut frame = sht31_frame(25.0, 50.0);
    frame[5] ^= 0xFF; // humidity CRC
    buses["chamber"].queue(frame);

    let mut acq = pipeline.acquisition(RecordingActuator::new());
    let report = acq.tick(&mut RecordingSink::new());
    assert_eq!(report.partial, 1);

    let s = pipeline.registry().by_name("chamber").unwrap();
    assert!(s.value(TEMPERATURE).is_some());
    assert_eq!(s.value(HUMIDITY), None);
    assert_eq!(s.sample_count(TEMPERATURE), 1);
    assert_eq!(s.sample_count(HUMIDITY), 0);
}

#[test]
fn failed_fan_command_is_retried_next_tick() {
    let cfg = config(
        vec![sensor("chamber", "SHT31")],
        vec![],
        Some(fan_above("chamber", 50.0)),
    );
    let (pipeline, ports) = build_scripted(&cfg);
    let actuator = RecordingActuator::new();
    actuator.set_failing(true);
    let mut acq = pipeline.acquisition(actuator.clone());
    let mut sink = RecordingSink::new();

    ports["chamber"].queue(th(55.0, 40.0));
    assert_eq!(acq.tick(&mut sink).fan, Some(FanDecision::Failed(FanState::On)));
    assert_eq!(acq.fan_state(), Some(FanState::Off));

    actuator.set_failing(false);
    ports["chamber"].queue(th(55.0, 40.0));
    assert_eq!(acq.tick(&mut sink).fan, Some(FanDecision::Switched(FanState::On)));

    ports["chamber"].queue(th(55.0, 40.0));
    assert_eq!(acq.tick(&mut sink).fan, Some(FanDecision::Unchanged(FanState::On)));

    assert_eq!(actuator.calls().len(), 2);
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::FanCommandFailed { .. })),
        1
    );
}

#[test]
fn fan_follows_smoothed_value_not_raw() {
    let cfg = config(
        vec![sensor("chamber", "SHT31")],
        vec![],
        Some(fan_above("chamber", 30.0)),
    );
    let (pipeline, ports) = build_scripted(&cfg);
    let actuator = RecordingActuator::new();
    let mut acq = pipeline.acquisition(actuator.clone());
    let mut sink = RecordingSink::new();

    ports["chamber"].queue(th(20.0, 40.0));
    acq.tick(&mut sink);
    // Raw 35 but mean (20 + 35) / 2 = 27.5 stays below 30.
    ports["chamber"].queue(th(35.0, 40.0));
    assert_eq!(acq.tick(&mut sink).fan, Some(FanDecision::Unchanged(FanState::Off)));
    // Mean (20 + 35 + 35) / 3 = 30.
    ports["chamber"].queue(th(35.0, 40.0));
    assert_eq!(acq.tick(&mut sink).fan, Some(FanDecision::Switched(FanState::On)));
    assert_eq!(actuator.calls().len(), 1);
}

#[test]
fn fan_on_trigger_without_samples_is_not_evaluated() {
    let cfg = config(
        vec![sensor("chamber", "SHT31")],
        vec![],
        Some(fan_above("chamber", 30.0)),
    );
    let (pipeline, _ports) = build_scripted(&cfg);
    let actuator = RecordingActuator::new();
    let mut acq = pipeline.acquisition(actuator.clone());
    assert_eq!(acq.tick(&mut RecordingSink::new()).fan, Some(FanDecision::NoReading));
    assert!(actuator.calls().is_empty());
}

// ── Publication ───────────────────────────────────────────────

#[test]
fn one_message_per_group_with_nulls_before_samples() {
    let cfg = config(
        vec![sensor("chamber", "SHT31"), sensor("room", "SHT31")],
        vec![group("Chamber", &["chamber"]), group("ROOM", &["room"])],
        None,
    );
    let (pipeline, ports) = build_scripted(&cfg);
    let mut acq = pipeline.acquisition(RecordingActuator::new());
    ports["chamber"].queue(th(23.456, 41.0));
    acq.tick(&mut RecordingSink::new());

    let publisher = MockPublisher::new();
    let mut publ = pipeline.publication(publisher.clone());
    let mut sink = RecordingSink::new();
    assert_eq!(publ.tick(&mut sink), 2);

    assert_eq!(
        publisher.messages(),
        [
            ("sensor/chamber".to_string(), json!({"temp": 23.46, "hum": 41.0})),
            ("sensor/room".to_string(), json!({"temp": null, "hum": null})),
        ]
    );
    assert_eq!(sink.count(|e| matches!(e, AppEvent::Published { .. })), 2);

    publ.tick(&mut sink);
    assert_eq!(publisher.messages().len(), 4);
}

#[test]
fn later_member_wins_duplicate_key() {
    let cfg = config(
        vec![sensor("low", "SHT31"), sensor("high", "SHT31")],
        vec![group("g", &["low", "high"])],
        None,
    );
    let (pipeline, ports) = build_scripted(&cfg);
    ports["low"].queue(th(10.0, 10.0));
    ports["high"].queue(th(30.0, 60.0));
    pipeline
        .acquisition(RecordingActuator::new())
        .tick(&mut RecordingSink::new());

    let publisher = MockPublisher::new();
    pipeline.publication(publisher.clone()).tick(&mut RecordingSink::new());
    assert_eq!(publisher.messages()[0].1, json!({"temp": 30.0, "hum": 60.0}));
}

#[test]
fn rejected_publish_is_reported_and_loop_continues() {
    let cfg = config(
        vec![sensor("chamber", "SHT31")],
        vec![group("a", &["chamber"]), group("b", &["chamber"])],
        None,
    );
    let (pipeline, _ports) = build_scripted(&cfg);
    let publisher = MockPublisher::new();
    publisher.full.store(true, Ordering::SeqCst);

    let mut publ = pipeline.publication(publisher.clone());
    let mut sink = RecordingSink::new();
    assert_eq!(publ.tick(&mut sink), 0);
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::PublishFailed { error: PublishError::QueueFull, .. })),
        2
    );

    publisher.full.store(false, Ordering::SeqCst);
    assert_eq!(publ.tick(&mut sink), 2);
}

// ── Startup errors ────────────────────────────────────────────

#[test]
fn unknown_sensor_kind_is_fatal() {
    let cfg = config(vec![sensor("x", "BME280")], vec![], None);
    let err = Pipeline::build(&cfg, |_| unreachable!("no sensor may be opened")).unwrap_err();
    assert_eq!(err, Error::Config(ConfigError::UnknownSensorKind("BME280".into())));
}

#[test]
fn unavailable_bus_is_fatal() {
    let cfg = config(vec![sensor("chamber", "SHT31")], vec![], None);
    let err = Pipeline::build(&cfg, |d| Err(SensorError::BusUnavailable(d.bus).into())).unwrap_err();
    assert_eq!(err, Error::Sensor(SensorError::BusUnavailable(1)));
}

#[test]
fn address_override_reaches_the_driver() {
    let mut chamber = sensor("chamber", "SHT31");
    chamber.address = Some(0x45);
    let cfg = config(vec![chamber], vec![], None);
    let (pipeline, buses) = build_on_mock_buses(&cfg);
    buses["chamber"].queue(sht31_frame(20.0, 30.0));
    pipeline
        .acquisition(RecordingActuator::new())
        .tick(&mut RecordingSink::new());
    assert_eq!(buses["chamber"].writes(), [(0x45, vec![0x2C, 0x06])]);
    assert_ne!(sht31::DEFAULT_ADDRESS, 0x45);
}

#[test]
fn started_event_summarises_pipeline() {
    let cfg = config(
        vec![sensor("chamber", "SHT31")],
        vec![group("g", &["chamber"])],
        Some(fan_above("chamber", 30.0)),
    );
    let (pipeline, _ports) = build_scripted(&cfg);
    assert_eq!(
        pipeline.started_event(),
        AppEvent::Started {
            sensors: 1,
            groups: 1,
            fan: Some("exhaust".into())
        }
    );
}

// ── Concurrency ───────────────────────────────────────────────

#[test]
fn loops_run_concurrently_over_shared_registry() {
    let cfg = config(
        vec![sensor("chamber", "SHT31"), sensor("voc", "SGP40")],
        vec![group("chamber", &["chamber", "voc"])],
        Some(fan_above("chamber", 25.0)),
    );
    let (pipeline, ports) = build_scripted(&cfg);
    for i in 0..200 {
        let t = 24.0 + (i % 10) as f32;
        ports["chamber"].queue(th(t, 50.0));
        ports["voc"].queue(Readings::new().with(AIR_QUALITY, 30_000.0));
    }

    let actuator = RecordingActuator::new();
    let publisher = MockPublisher::new();
    let running = AtomicBool::new(true);
    let period = Duration::from_millis(1);

    thread::scope(|s| {
        let mut acq = pipeline.acquisition(actuator.clone());
        let mut publ = pipeline.publication(publisher.clone());
        let running = &running;

        let a = spawn_loop(s, "acquisition", move || {
            let mut sink = RecordingSink::new();
            Schedule::periodic("acquisition", period).run(running, || {
                acq.tick(&mut sink);
                if acq.tick_count() >= 100 {
                    running.store(false, Ordering::Release);
                }
            })
        })
        .unwrap();
        let p = spawn_loop(s, "publication", move || {
            let mut sink = RecordingSink::new();
            Schedule::periodic("publication", period).run(running, || {
                publ.tick(&mut sink);
            })
        })
        .unwrap();

        assert_eq!(a.join().unwrap(), 100);
        assert!(p.join().unwrap() > 0);
    });

    for (topic, payload) in publisher.messages() {
        assert_eq!(topic, "sensor/chamber");
        if let Some(t) = payload["temp"].as_f64() {
            assert!((24.0..=33.0).contains(&t), "temp {t} outside sample range");
        }
        if let Some(aqi) = payload["aqi"].as_f64() {
            assert_eq!(aqi, 30000.0);
        }
    }

    let s = pipeline.registry().by_name("chamber").unwrap();
    assert_eq!(s.sample_count(TEMPERATURE), 10);
    // The fan switched at least once and never sent the same state twice in a row.
    let calls = actuator.calls();
    assert!(!calls.is_empty());
    assert!(calls.windows(2).all(|w| w[0].1 != w[1].1));
}

/// Driver that panics on one chosen call and otherwise reads a constant.
struct PanicsOnce {
    calls: Arc<AtomicUsize>,
    panic_on: usize,
}

impl SensorPort for PanicsOnce {
    fn quantities(&self) -> &'static [sensett::sensors::QuantitySpec] {
        sht31::QUANTITIES
    }

    fn acquire(&mut self, _inputs: &Readings) -> Readings {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.panic_on {
            panic!("driver fault on call {n}");
        }
        th(22.0, 45.0)
    }
}

#[test]
fn driver_panic_does_not_kill_acquisition_loop() {
    let cfg = config(
        vec![sensor("chamber", "SHT31")],
        vec![group("chamber", &["chamber"])],
        None,
    );
    let calls = Arc::new(AtomicUsize::new(0));
    let driver_calls = Arc::clone(&calls);
    let pipeline = Pipeline::build(&cfg, move |_| {
        Ok(Box::new(PanicsOnce {
            calls: Arc::clone(&driver_calls),
            panic_on: 2,
        }) as Box<dyn SensorPort>)
    })
    .unwrap();

    let publisher = MockPublisher::new();
    let running = AtomicBool::new(true);
    let period = Duration::from_millis(1);

    thread::scope(|s| {
        let mut acq = pipeline.acquisition(RecordingActuator::new());
        let mut publ = pipeline.publication(publisher.clone());
        let running = &running;

        let a = spawn_loop(s, "acquisition", move || {
            let mut sink = RecordingSink::new();
            Schedule::periodic("acquisition", period).run(running, || {
                acq.tick(&mut sink);
                if acq.tick_count() >= 10 {
                    running.store(false, Ordering::Release);
                }
            })
        })
        .unwrap();
        // Never stops on its own: it ends because the acquisition loop
        // cleared the shared flag.
        let p = spawn_loop(s, "publication", move || {
            let mut sink = RecordingSink::new();
            Schedule::periodic("publication", period).run(running, || {
                publ.tick(&mut sink);
            })
        })
        .unwrap();

        assert_eq!(a.join().unwrap(), 10);
        assert!(p.join().is_ok());
    });

    assert_eq!(calls.load(Ordering::SeqCst), 10);
    assert!(!running.load(Ordering::Acquire));
    // Nine good reads made it into the window; the panicking one did not.
    let s = pipeline.registry().by_name("chamber").unwrap();
    assert_eq!(s.sample_count(TEMPERATURE), 9);
    assert_eq!(s.value(TEMPERATURE), Some(22.0));
}
