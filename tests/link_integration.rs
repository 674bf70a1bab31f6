// Link + TCP transport against an in-process coordinator.
mod common;

use std::time::Duration;

use common::{FakeCoordinator, Reply, config_bytes, echo_rpc, no_rpc};
use coordlink::core::link::GET_CONFIG;
use coordlink::core::status::TransportStatus;
use coordlink::transport::wire::read_frame;
use coordlink::{CoordinatorLink, ErrorKind, PollOutcome, TcpTransport};

const CONNECT: Duration = Duration::from_secs(2);

fn connect(coordinator: &FakeCoordinator) -> CoordinatorLink<TcpTransport> {
    let transport = TcpTransport::connect(&coordinator.addr(), CONNECT).expect("connect");
    CoordinatorLink::new(transport)
}

#[test]
fn versions_advance_in_order() {
    let coordinator = FakeCoordinator::scripted(vec![config_bytes(5), config_bytes(7)], no_rpc);
    let mut link = connect(&coordinator);
    assert_eq!(link.version(), 0);

    assert_eq!(link.wait_for_config().expect("first"), 5);
    assert_eq!(link.config().space("kv").map(|space| space.id), Some(1));
    assert_eq!(link.wait_for_config().expect("second"), 7);
    assert_eq!(link.config().server_address(2), Some("10.0.0.2:2012"));
    assert_eq!(coordinator.count(GET_CONFIG), 2);
}

#[test]
fn wait_blocks_through_repeated_version() {
    let coordinator = FakeCoordinator::scripted(
        vec![config_bytes(5), config_bytes(5), config_bytes(7)],
        no_rpc,
    );
    let mut link = connect(&coordinator);

    assert_eq!(link.wait_for_config().expect("first"), 5);
    assert_eq!(
        link.wait_for_config_timeout(Duration::from_secs(5))
            .expect("second"),
        7
    );
    assert_eq!(coordinator.count(GET_CONFIG), 3);
    assert!(link.pending_request().is_none());
}

#[test]
fn bounded_wait_keeps_request_in_flight() {
    let coordinator = FakeCoordinator::scripted(vec![config_bytes(1)], no_rpc);
    let mut link = connect(&coordinator);
    link.wait_for_config().expect("first");

    let err = link
        .wait_for_config_timeout(Duration::from_millis(100))
        .expect_err("held");
    assert_eq!(err.kind(), ErrorKind::PollFailed);
    assert!(link.pending_request().is_some());
    assert_eq!(link.transport().outstanding(), 1);
    assert_eq!(link.version(), 1);
}

#[test]
fn regressed_version_is_badconfig_then_recovers() {
    let coordinator = FakeCoordinator::scripted(
        vec![config_bytes(4), config_bytes(2), config_bytes(6)],
        no_rpc,
    );
    let mut link = connect(&coordinator);
    assert_eq!(link.wait_for_config().expect("first"), 4);

    let err = link.wait_for_config().expect_err("older");
    assert_eq!(err.kind(), ErrorKind::BadConfig);
    assert_eq!(err.version(), Some(2));
    assert_eq!(link.version(), 4);

    assert_eq!(link.wait_for_config().expect("newer"), 6);
}

#[test]
fn garbage_config_leaves_cache_untouched() {
    let mut truncated = config_bytes(9);
    truncated.truncate(truncated.len() - 3);
    let coordinator = FakeCoordinator::scripted(vec![config_bytes(3), truncated], no_rpc);
    let mut link = connect(&coordinator);
    link.wait_for_config().expect("first");

    let err = link.wait_for_config().expect_err("truncated");
    assert_eq!(err.kind(), ErrorKind::BadConfig);
    assert_eq!(link.version(), 3);
    assert!(link.pending_request().is_none());
}

#[test]
fn poll_reports_idle_while_coordinator_holds() {
    let coordinator = FakeCoordinator::scripted(Vec::new(), no_rpc);
    let mut link = connect(&coordinator);
    assert_eq!(link.poll_for_config().expect("poll"), PollOutcome::Idle);
    let pending = link.pending_request();
    assert!(pending.is_some());
    assert_eq!(link.poll_for_config().expect("poll"), PollOutcome::Idle);
    assert_eq!(link.pending_request(), pending);
}

#[test]
fn rpc_round_trips_while_get_config_is_held() {
    let coordinator = FakeCoordinator::scripted(Vec::new(), echo_rpc);
    let mut link = connect(&coordinator);
    link.poll_for_config().expect("poll");
    let pending = link.pending_request();

    let output = link.make_rpc("echo", b"ping").expect("rpc");
    assert_eq!(output, b"ping");
    assert_eq!(link.pending_request(), pending);
    assert_eq!(link.transport().outstanding(), 1);
}

#[test]
fn rpc_unknown_function_is_coordfail() {
    let coordinator = FakeCoordinator::scripted(Vec::new(), echo_rpc);
    let mut link = connect(&coordinator);
    let err = link.make_rpc("missing", b"").expect_err("unknown");
    assert_eq!(err.kind(), ErrorKind::CoordFail);
    assert!(err.request_id().is_some());
}

#[test]
fn custom_service_name_reaches_coordinator() {
    let coordinator = FakeCoordinator::start(|request| {
        if request.service == "hyperdex" {
            Reply::Respond(TransportStatus::Success, config_bytes(2))
        } else {
            Reply::Respond(TransportStatus::FuncNotFound, Vec::new())
        }
    });
    let mut link = connect(&coordinator).with_service("hyperdex");
    assert_eq!(link.wait_for_config().expect("config"), 2);
    assert!(coordinator.requests().iter().all(|r| r.service == "hyperdex"));
}

#[test]
fn lost_connection_is_coordfail() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let address = listener.local_addr().expect("addr").to_string();
    let server = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        read_frame(&mut stream).expect("read").expect("frame");
    });
    let transport = TcpTransport::connect(&address, CONNECT).expect("connect");
    let mut link = CoordinatorLink::new(transport);

    let err = link.wait_for_config().expect_err("peer hung up");
    server.join().expect("server");
    assert_eq!(err.kind(), ErrorKind::CoordFail);
    assert_eq!(link.version(), 0);
}
