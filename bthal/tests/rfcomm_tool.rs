use bthal::{
    app::Session,
    dispatch::{Dispatcher, Origin},
    hal::{AdapterState, Property, SspVariant},
    rfcomm::{self, RfcTest, RfcommContext},
    ErrorKind,
};
use std::sync::Arc;

mod common;
use common::{addr, config, console, MockHal};

async fn started(hal: &Arc<MockHal>) -> (Arc<Dispatcher<RfcommContext>>, bthal::console::Transcript) {
    let (console, transcript) = console();
    let d = rfcomm::start(hal.clone(), &config(), console).await.unwrap();
    (d, transcript)
}

#[tokio::test(flavor = "multi_thread")]
async fn startup_only_initializes() {
    let hal = Arc::new(MockHal::new());
    let (d, transcript) = started(&hal).await;

    assert_eq!(hal.calls(), ["init", "set_os_callouts"]);
    assert!(!d.context().adapter().is_enabled());
    assert_eq!(transcript.count("HAL REQUEST SUCCESS"), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn device_under_test_modes() {
    let hal = Arc::new(MockHal::new());
    let rfcomm = hal.rfcomm().unwrap();
    let (d, transcript) = started(&hal).await;

    d.process("rfcomm", Origin::Console);
    d.process("server_rfcomm", Origin::Console);
    d.process("dis_client", Origin::Console);

    assert_eq!(rfcomm.calls(), ["rdut_rfcomm Client", "rdut_rfcomm Server", "rdut_rfcomm Disconnect"]);
    assert_eq!(transcript.count("rfcomm client"), 1);
    assert_eq!(transcript.count("rfcomm server"), 1);
    assert_eq!(transcript.count("rfcomm disc from Server"), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_requests() {
    let hal = Arc::new(MockHal::new());
    let rfcomm = hal.rfcomm().unwrap();
    let (d, transcript) = started(&hal).await;
    let peer = addr("00:11:22:33:44:55");

    d.process("rfc_con 001122334455 5", Origin::Console);
    d.process("rfc_msccon 00:11:22:33:44:55 7", Origin::Console);
    d.process("role_sw 001122334455 1", Origin::Console);
    d.process("rfc_rls", Origin::Console);
    d.process("rfc_senddata", Origin::Console);

    assert_eq!(
        rfcomm.tests(),
        [
            RfcTest::Client { address: peer, scn: 5 },
            RfcTest::ClientTestMscData { address: peer, scn: 7 },
            RfcTest::RoleSwitch { address: peer, role: 1 },
            RfcTest::FrameError,
            RfcTest::WriteData,
        ]
    );
    assert_eq!(transcript.count("bdt do_rfc_con"), 1);
    assert_eq!(transcript.count("SCN =5"), 1);
    assert_eq!(transcript.count("bdt do_rfc_con_for_test_msc_data"), 1);
    assert_eq!(transcript.count("SCN =7"), 1);
    assert_eq!(transcript.count("bdt do_role_switch"), 1);
    assert_eq!(transcript.count("bdt rfc_rls"), 1);
    assert_eq!(transcript.count("bdt rfc_send_data"), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn channel_number_reads_like_atoi() {
    let hal = Arc::new(MockHal::new());
    let rfcomm = hal.rfcomm().unwrap();
    let (d, _transcript) = started(&hal).await;
    let peer = addr("00:11:22:33:44:55");

    d.process("rfc_con 001122334455 3x", Origin::Console);
    d.process("rfc_con 001122334455", Origin::Console);

    assert_eq!(
        rfcomm.tests(),
        [RfcTest::Client { address: peer, scn: 3 }, RfcTest::Client { address: peer, scn: 0 }]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_address_makes_no_request() {
    let hal = Arc::new(MockHal::new());
    let rfcomm = hal.rfcomm().unwrap();
    let (d, transcript) = started(&hal).await;

    d.process("rfc_con 0011223344 5", Origin::Console);

    assert!(rfcomm.tests().is_empty());
    assert_eq!(transcript.count("invalid Bluetooth address: 0011223344"), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_test_interface_is_reported() {
    let hal = Arc::new(MockHal::new().without_rfcomm());
    let (d, transcript) = started(&hal).await;

    d.process("rfcomm", Origin::Console);
    d.process("rfc_rls", Origin::Console);

    assert_eq!(transcript.count("rfcomm client"), 1);
    assert_eq!(transcript.count("bdt rfc_rls"), 1);
    assert_eq!(transcript.count("interface not loaded"), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_init_keeps_console_running() {
    let hal = Arc::new(MockHal::new().failing_init());
    let (d, transcript) = started(&hal).await;

    assert_eq!(transcript.count("HAL REQUEST FAILED status : 1 (BT_STATUS_FAIL)"), 1);
    assert!(!hal.called("set_os_callouts"));
    assert!(matches!(d.context().rfcomm(), Err(err) if err.kind == ErrorKind::InterfaceNotLoaded));

    d.process("server_rfcomm", Origin::Console);
    assert_eq!(transcript.count("interface not loaded"), 1);
    assert!(hal.rfcomm().unwrap().calls().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_vendor_interface_is_fatal() {
    let hal = Arc::new(MockHal::new().without_vendor());
    let (console, _transcript) = console();

    let err = rfcomm::start(hal.clone(), &config(), console).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::VendorInterfaceNotFound);
}

#[tokio::test(flavor = "multi_thread")]
async fn pairing_requests() {
    let hal = Arc::new(MockHal::new());
    let (_d, transcript) = started(&hal).await;
    let peer = addr("00:11:22:33:44:55");

    hal.fire(move |l| l.ssp_request(peer, "peer", 0, SspVariant::PasskeyEntry, 0));
    assert_eq!(transcript.count("bdt ssp remote request not supported"), 1);
    assert!(!hal.calls().iter().any(|c| c.starts_with("ssp_reply")));

    hal.fire(move |l| l.ssp_request(peer, "peer", 0, SspVariant::Consent, 0));
    assert_eq!(transcript.count("bdt accept SSP pairing"), 1);
    assert!(hal.called("ssp_reply 00:11:22:33:44:55 Consent true 0"));
}

#[tokio::test(flavor = "multi_thread")]
async fn adapter_callbacks_are_printed() {
    let hal = Arc::new(MockHal::new());
    let (d, transcript) = started(&hal).await;

    let on = d.context().adapter().events().expect("adapter on", |evt| {
        *evt == bthal::event::HalEvent::AdapterState(AdapterState::On)
    });
    d.process("enable", Origin::Console);
    on.wait(std::time::Duration::from_secs(5)).await.unwrap();
    hal.fire(|l| {
        l.device_found(&[Property::Address(addr("00:11:22:33:44:55")), Property::Name("Remote AP".into())])
    });

    assert_eq!(transcript.count("ADAPTER STATE UPDATED : ON"), 1);
    assert_eq!(transcript.count("AP name is : Remote AP"), 1);
}
