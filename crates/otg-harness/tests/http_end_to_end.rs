//! Full runs over HTTP: simulator served on loopback, driven through
//! the real `HttpController`.

use otg_client::{Controller, ControllerError, HttpController};
use otg_harness::{CapturePort, Harness, HarnessError, PersistCapture, RunSettings, b2b};
use otg_model::{CaptureRequest, Config};
use otg_sim::test_util::SimServer;

#[test]
fn b2b_over_http() {
    let server = SimServer::start().unwrap();
    let controller = HttpController::new(server.base_url());
    let path = std::env::temp_dir().join(format!("otg-harness-http-{}.pcap", std::process::id()));

    let settings = RunSettings {
        verify_round_trip: true,
        persist: Some(PersistCapture {
            port: CapturePort::LastDeclared,
            path: path.clone(),
        }),
        ..RunSettings::default()
    };
    let report = Harness::new(&controller, settings)
        .run(&b2b("eth1", "eth2"))
        .unwrap();

    assert_eq!(report.counts.expected, 2000);
    assert_eq!(report.counts.total_tx, 2000);
    assert!(report.counts.total_rx >= 2000);
    assert!(report.captures.iter().all(|c| c.frames == 1000));

    let written = std::fs::read(&path).unwrap();
    let direct = server
        .sim()
        .capture(&CaptureRequest::new("p2"))
        .unwrap();
    assert_eq!(written, direct);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn rejection_over_http_keeps_error_details() {
    let server = SimServer::start().unwrap();
    let controller = HttpController::new(server.base_url());

    let mut config = b2b("eth1", "eth2");
    config.port("p2", "eth3");

    let err = Harness::new(&controller, RunSettings::default())
        .run(&config)
        .unwrap_err();
    match err {
        HarnessError::Controller(ControllerError::Rejected { operation, details }) => {
            assert_eq!(operation, "set_config");
            assert_eq!(details.code, 400);
            assert!(details.errors.iter().any(|e| e.contains("duplicate port name")));
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn get_config_over_http_round_trips() {
    let server = SimServer::start().unwrap();
    let controller = HttpController::new(server.base_url());
    let config = b2b("eth1", "eth2");

    controller.set_config(&config).unwrap();
    assert_eq!(controller.get_config().unwrap(), config);

    controller.set_config(&Config::default()).unwrap();
    assert_eq!(controller.get_config().unwrap(), Config::default());
}
