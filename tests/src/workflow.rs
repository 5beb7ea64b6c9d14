use std::net::SocketAddrV4;

use atacfg_common::config::{Config, UpdatePolicy};
use atacfg_common::error::{ProvisionError, exit_code};
use atacfg_common::version::VersionComparison;
use atacfg_core::workflow::{ProvisioningWorkflow, Stage};

use crate::support::*;

fn upgrade_command() -> String {
    format!("set 192 {}", SocketAddrV4::new(LOCAL_IP, 80))
}

#[tokio::test(start_paused = true)]
async fn outdated_adapter_is_upgraded_then_configured() {
    let rig = Rig::new(FakeAdapter::new(OLD_FIRMWARE, "admin").installing(NEW_FIRMWARE));

    let report = ProvisioningWorkflow::new(config(UpdatePolicy::Ask), rig.collaborators())
        .run()
        .await;

    assert!(report.is_ok(), "Provisioning failed: {:?}", report.err());
    let report = report.unwrap();

    assert_eq!(
        report.stages,
        [
            Stage::Discovering,
            Stage::Connecting,
            Stage::CheckingVersion,
            Stage::Upgrading,
            Stage::VerifyingReboot,
            Stage::CollectingPlan,
            Stage::Applying,
            Stage::VerifyingReboot,
            Stage::Done,
        ]
    );
    assert_eq!(report.device.device_addr(), ADAPTER_IP);

    let firmware = report.firmware.as_ref().unwrap();
    assert_eq!(firmware.outcome, VersionComparison::NeedsUpgrade);
    assert_eq!(firmware.device, Some(OLD_FIRMWARE));
    assert_eq!(firmware.latest, Some(NEW_FIRMWARE));
    assert_eq!(firmware.model.as_deref(), Some("ht801"));
    assert_eq!(report.upgraded_to, Some(NEW_FIRMWARE));
    assert!(report.verified);
    assert!(!report.reset);

    // The firmware server ran on the selected interface's address.
    assert_eq!(rig.firmware.served(), [SocketAddrV4::new(LOCAL_IP, 80)]);
    assert_eq!(rig.adapter.version(), NEW_FIRMWARE);
    assert_eq!(rig.adapter.password(), NEW_ADMIN);

    let sent = rig.adapter.sent();
    assert_eq!(sent[0], "status");
    assert!(sent.contains(&upgrade_command()));
    assert!(sent.contains(&format!("set 2 {NEW_ADMIN}")));
    assert_eq!(sent.last().map(String::as_str), Some("reboot"));

    // The new firmware enforces the strict admin password rule.
    assert_eq!(rig.plan.policies().len(), 1);
    assert!(rig.plan.policies()[0].strict);

    assert_eq!(rig.adapter.logins(), ["admin", "admin", NEW_ADMIN]);
    assert_eq!(rig.adapter.closed(), 3);

    let questions = rig.operator.questions();
    assert_eq!(questions.len(), 2);
    assert!(questions[1].contains("1.0.29.0"));
    assert!(questions[1].contains("2.0.0.0"));
}

#[tokio::test(start_paused = true)]
async fn three_rejected_passwords_abort_before_any_command() {
    let mut rig = Rig::new(FakeAdapter::new(OLD_FIRMWARE, "hunter22"));
    rig.operator = ScriptedOperator::agreeing().with_passwords(&["letmein", "password", "12345678"]);

    let err = ProvisioningWorkflow::new(config(UpdatePolicy::Always), rig.collaborators())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::PasswordsExhausted { attempts: 3 }));
    assert_eq!(err.exit_code(), exit_code::PASSWORDS_EXHAUSTED);
    assert!(err.guidance().unwrap().contains("reset"));

    assert_eq!(rig.operator.prompts(), 3);
    assert_eq!(
        rig.adapter.logins(),
        ["admin", "letmein", "password", "12345678"]
    );
    assert!(rig.adapter.sent().is_empty());
    assert!(rig.firmware.served().is_empty());
}

#[tokio::test(start_paused = true)]
async fn operator_supplied_password_opens_the_session() {
    let mut rig = Rig::new(FakeAdapter::new(NEW_FIRMWARE, "letmein"));
    rig.operator = ScriptedOperator::agreeing().with_passwords(&["wrong", "letmein"]);

    let report = ProvisioningWorkflow::new(config(UpdatePolicy::Always), rig.collaborators())
        .run()
        .await
        .unwrap();

    assert_eq!(rig.operator.prompts(), 2);
    assert!(report.verified);
    assert_eq!(rig.adapter.password(), NEW_ADMIN);
}

#[tokio::test(start_paused = true)]
async fn version_mismatch_after_upgrade_is_fatal() {
    // The image never takes, the adapter reboots into the old firmware.
    let rig = Rig::new(FakeAdapter::new(OLD_FIRMWARE, "admin"));

    let err = ProvisioningWorkflow::new(config(UpdatePolicy::Always), rig.collaborators())
        .run()
        .await
        .unwrap_err();

    match &err {
        ProvisionError::UpgradeMismatch { expected, found } => {
            assert_eq!(*expected, NEW_FIRMWARE);
            assert_eq!(*found, Some(OLD_FIRMWARE));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.exit_code(), exit_code::UPGRADE_MISMATCH);

    assert_eq!(rig.firmware.served().len(), 1);
    assert!(rig.plan.policies().is_empty());
    assert!(!rig.adapter.sent().iter().any(|line| line.starts_with("set 2 ")));
    assert_eq!(rig.adapter.password(), "admin");
}

#[tokio::test(start_paused = true)]
async fn busy_update_port_stops_before_the_device_is_told_anything() {
    let mut rig = Rig::new(FakeAdapter::new(OLD_FIRMWARE, "admin").installing(NEW_FIRMWARE));
    rig.firmware = FakeFirmwareHost::busy();

    let err = ProvisioningWorkflow::new(config(UpdatePolicy::Always), rig.collaborators())
        .run()
        .await
        .unwrap_err();

    assert!(
        matches!(err, ProvisionError::PortInUse { addr } if addr == SocketAddrV4::new(LOCAL_IP, 80))
    );
    assert_eq!(err.exit_code(), exit_code::PORT_IN_USE);
    assert_eq!(rig.adapter.sent(), ["status"]);
    assert_eq!(rig.adapter.version(), OLD_FIRMWARE);
    assert_eq!(rig.adapter.closed(), 1);
}

#[tokio::test(start_paused = true)]
async fn current_firmware_goes_straight_to_configuration() {
    let rig = Rig::new(FakeAdapter::new(NEW_FIRMWARE, "admin"));

    let report = ProvisioningWorkflow::new(config(UpdatePolicy::Always), rig.collaborators())
        .run()
        .await
        .unwrap();

    assert!(!report.stages.contains(&Stage::Upgrading));
    assert_eq!(
        report.firmware.map(|check| check.outcome),
        Some(VersionComparison::UpToDate)
    );
    assert_eq!(report.upgraded_to, None);
    assert!(rig.firmware.served().is_empty());
    assert!(!rig.adapter.sent().contains(&upgrade_command()));
    assert!(report.verified);
}

#[tokio::test(start_paused = true)]
async fn skipped_update_leaves_firmware_alone() {
    let rig = Rig::new(FakeAdapter::new(OLD_FIRMWARE, "admin").installing(NEW_FIRMWARE));

    let report = ProvisioningWorkflow::new(config(UpdatePolicy::Skip), rig.collaborators())
        .run()
        .await
        .unwrap();

    assert!(!report.stages.contains(&Stage::Upgrading));
    assert_eq!(report.firmware, None);
    assert_eq!(report.upgraded_to, None);
    assert!(rig.firmware.served().is_empty());
    assert!(!rig.adapter.sent().contains(&upgrade_command()));
    assert_eq!(rig.adapter.version(), OLD_FIRMWARE);
    assert!(rig.operator.questions().iter().all(|q| !q.contains("Upgrade")));
}

#[tokio::test(start_paused = true)]
async fn skipped_update_still_applies_the_strict_password_rule() {
    let rig = Rig::new(FakeAdapter::new(NEW_FIRMWARE, "admin"));

    let report = ProvisioningWorkflow::new(config(UpdatePolicy::Skip), rig.collaborators())
        .run()
        .await
        .unwrap();

    assert_eq!(rig.adapter.sent()[0], "status");
    assert!(report.stages.contains(&Stage::CheckingVersion));
    assert!(rig.plan.policies()[0].strict);
    assert!(report.verified);
}

#[tokio::test(start_paused = true)]
async fn required_update_without_version_file_is_fatal() {
    let mut rig = Rig::new(FakeAdapter::new(OLD_FIRMWARE, "admin"));
    rig.latest = None;

    let err = ProvisioningWorkflow::new(config(UpdatePolicy::Require), rig.collaborators())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(&err, ProvisionError::MissingVersionFile { model, .. } if model == "ht801"));
    assert_eq!(err.exit_code(), exit_code::MISSING_VERSION_FILE);
    assert_eq!(rig.adapter.sent(), ["status"]);
}

#[tokio::test(start_paused = true)]
async fn reset_returns_to_factory_password_before_configuring() {
    let mut rig = Rig::new(FakeAdapter::new(NEW_FIRMWARE, "old-pass"));
    rig.plan = FixedPlan::new(true);
    let config = Config {
        initial_password: "old-pass".into(),
        ..config(UpdatePolicy::Always)
    };

    let report = ProvisioningWorkflow::new(config, rig.collaborators())
        .run()
        .await
        .unwrap();

    assert_eq!(
        report.stages,
        [
            Stage::Discovering,
            Stage::Connecting,
            Stage::CheckingVersion,
            Stage::CollectingPlan,
            Stage::Applying,
            Stage::VerifyingReboot,
            Stage::Applying,
            Stage::VerifyingReboot,
            Stage::Done,
        ]
    );
    assert!(report.reset);
    assert!(report.verified);

    let sent = rig.adapter.sent();
    let reset = sent.iter().position(|line| line == "reset 0").unwrap();
    let configure = sent.iter().position(|line| line == "config").unwrap();
    assert!(reset < configure);

    assert_eq!(rig.adapter.logins(), ["old-pass", "admin", NEW_ADMIN]);
    assert_eq!(rig.adapter.password(), NEW_ADMIN);
}

#[tokio::test(start_paused = true)]
async fn silent_adapter_after_configuring_is_only_a_warning() {
    let rig =
        Rig::new(FakeAdapter::new(NEW_FIRMWARE, "admin").offline_after_restarts(&[usize::MAX]));

    let report = ProvisioningWorkflow::new(config(UpdatePolicy::Always), rig.collaborators())
        .run()
        .await;

    assert!(report.is_ok(), "Provisioning failed: {:?}", report.err());
    let report = report.unwrap();

    assert!(!report.verified);
    assert_eq!(report.stages.last(), Some(&Stage::Done));
    assert_eq!(rig.adapter.sent().last().map(String::as_str), Some("reboot"));
    assert_eq!(rig.adapter.password(), NEW_ADMIN);

    // Only the session that sent the configuration was ever open.
    assert_eq!(rig.adapter.logins(), ["admin"]);
    assert_eq!(rig.adapter.closed(), 1);
}

#[tokio::test(start_paused = true)]
async fn adapter_lost_after_reset_is_reached_with_the_factory_password() {
    let config = Config {
        initial_password: "old-pass".into(),
        ..config(UpdatePolicy::Always)
    };
    // Factory and previous password are both tried on every attempt.
    let outage = config.timings.reconnect_attempts as usize * 2;

    let mut rig = Rig::new(
        FakeAdapter::new(NEW_FIRMWARE, "old-pass").offline_after_restarts(&[outage]),
    );
    rig.plan = FixedPlan::new(true);

    let report = ProvisioningWorkflow::new(config, rig.collaborators())
        .run()
        .await
        .unwrap();

    assert!(report.reset);
    assert!(report.verified);
    assert_eq!(report.stages.last(), Some(&Stage::Done));

    // The reconnect window saw no login at all; the fallback used the
    // factory password and the final check the new one.
    assert_eq!(rig.adapter.logins(), ["old-pass", "admin", NEW_ADMIN]);
    assert!(rig.adapter.sent().contains(&format!("set 2 {NEW_ADMIN}")));
    assert_eq!(rig.adapter.password(), NEW_ADMIN);
    assert_eq!(rig.operator.prompts(), 0);
}

#[tokio::test(start_paused = true)]
async fn missing_adapter_fails_the_run() {
    let mut rig = Rig::new(FakeAdapter::new(NEW_FIRMWARE, "admin"));
    rig.network = FakeNetwork::default().listening(GATEWAY, 80);

    let err = ProvisioningWorkflow::new(config(UpdatePolicy::Ask), rig.collaborators())
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), exit_code::DEVICE_NOT_FOUND);
    assert!(rig.adapter.logins().is_empty());
}
