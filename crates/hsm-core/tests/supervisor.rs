// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

mod common;

use chrono::{Duration as ChronoDuration, Utc};
use common::{layout, write, FakeMux};
use hsm_core::supervisor::{RunState, STOP_COMMAND};
use hsm_core::{BackupPolicy, FleetError, Ordinal, ProcessSupervisor, RuntimeSettings};
use hsm_credentials::SessionTokens;
use hsm_mux_core::{MockSessionMux, MuxError};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

fn ord(n: u32) -> Ordinal {
    Ordinal::new(n).unwrap()
}

fn runtime(dir: &Path) -> RuntimeSettings {
    RuntimeSettings {
        java: "java".into(),
        jvm_args: vec!["-Xms4G".into(), "-Xmx8G".into()],
        server_jar: layout(dir).server_jar(),
    }
}

fn fleet(dir: &Path, size: u32) -> (FakeMux, ProcessSupervisor) {
    let l = layout(dir);
    for n in 1..=size {
        std::fs::create_dir_all(l.instance_dir(ord(n))).unwrap();
    }
    let mux = FakeMux::new();
    let sup = ProcessSupervisor::new(Box::new(mux.clone()), l, runtime(dir)).with_grace(Duration::ZERO);
    (mux, sup)
}

fn tokens() -> SessionTokens {
    SessionTokens {
        session_token: "sess".into(),
        identity_token: "ident".into(),
        owner_uuid: "owner-1".into(),
        expires_at: Utc::now() + ChronoDuration::minutes(30),
    }
}

#[test]
fn stop_of_absent_session_then_start() {
    let dir = TempDir::new().unwrap();
    let (mux, sup) = fleet(dir.path(), 3);

    let err = sup.stop(ord(3)).unwrap_err();
    assert!(matches!(err, FleetError::SessionMissing(3)));
    assert!(mux.names().is_empty());

    sup.start(ord(3), &BackupPolicy::default(), None).unwrap();
    assert!(sup.has_session(ord(3)));
    let session = mux.session("hytale-server-3").unwrap();
    assert_eq!(session.workdir, dir.path().join("server-3"));
}

#[test]
fn start_never_restarts_a_running_instance() {
    let dir = TempDir::new().unwrap();
    let (_mux, sup) = fleet(dir.path(), 1);
    sup.start(ord(1), &BackupPolicy::default(), None).unwrap();
    let err = sup.start(ord(1), &BackupPolicy::default(), None).unwrap_err();
    assert!(matches!(err, FleetError::SessionExists(1)));
}

#[test]
fn start_requires_a_provisioned_instance() {
    let dir = TempDir::new().unwrap();
    let (mux, sup) = fleet(dir.path(), 1);
    let err = sup.start(ord(2), &BackupPolicy::default(), None).unwrap_err();
    assert!(matches!(err, FleetError::InvalidRequest(_)));
    assert!(mux.names().is_empty());
}

#[test]
fn invocation_composition() {
    let dir = TempDir::new().unwrap();
    let (_mux, sup) = fleet(dir.path(), 2);
    let jar = layout(dir.path()).server_jar().display().to_string();

    let plain = sup.compose_invocation(
        ord(2),
        &BackupPolicy {
            enabled: false,
            frequency: 60,
        },
        None,
    );
    assert_eq!(
        plain,
        vec!["java", "-Xms4G", "-Xmx8G", "-jar", jar.as_str(), "--bind", "0.0.0.0:5521"]
    );

    write(&dir.path().join("master-install/Assets.zip"), "assets");
    let full = sup.compose_invocation(ord(1), &BackupPolicy::default(), Some(&tokens()));
    let assets = dir.path().join("master-install/Assets.zip").display().to_string();
    assert_eq!(
        &full[5..],
        &[
            "--bind",
            "0.0.0.0:5520",
            "--assets",
            assets.as_str(),
            "--backup",
            "--backup-frequency",
            "60",
            "--session-token",
            "sess",
            "--identity-token",
            "ident",
            "--owner-uuid",
            "owner-1",
        ]
    );

    // The instance's own archive wins over the master copy
    write(&dir.path().join("server-1/Assets.zip"), "local");
    let local = sup.compose_invocation(ord(1), &BackupPolicy::default(), None);
    let pos = local.iter().position(|a| a == "--assets").unwrap();
    assert_eq!(local[pos + 1], dir.path().join("server-1/Assets.zip").display().to_string());
}

#[test]
fn incomplete_tokens_are_not_passed() {
    let dir = TempDir::new().unwrap();
    let (_mux, sup) = fleet(dir.path(), 1);
    let mut partial = tokens();
    partial.identity_token.clear();
    let cmd = sup.compose_invocation(ord(1), &BackupPolicy::default(), Some(&partial));
    assert!(!cmd.iter().any(|a| a == "--session-token"));

    let mut expired = tokens();
    expired.expires_at = Utc::now() - ChronoDuration::minutes(1);
    let cmd = sup.compose_invocation(ord(1), &BackupPolicy::default(), Some(&expired));
    assert!(!cmd.iter().any(|a| a == "--session-token"));
}

#[test]
fn stop_sends_the_console_command_then_kills() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(Mutex::new(Vec::<String>::new()));
    let mut mux = MockSessionMux::new();
    mux.expect_has_session().times(1).return_const(true);
    let log = calls.clone();
    mux.expect_send_keys().times(1).returning(move |name, text| {
        log.lock().unwrap().push(format!("send {name} {text}"));
        Ok(())
    });
    let log = calls.clone();
    mux.expect_kill_session().times(1).returning(move |name| {
        log.lock().unwrap().push(format!("kill {name}"));
        // Server exited on its own during the grace period
        Err(MuxError::SessionNotFound(name.to_string()))
    });

    let sup = ProcessSupervisor::new(Box::new(mux), layout(dir.path()), runtime(dir.path()))
        .with_grace(Duration::ZERO);
    sup.stop(ord(1)).unwrap();
    assert_eq!(
        *calls.lock().unwrap(),
        vec![
            format!("send hytale-server-1 {STOP_COMMAND}"),
            "kill hytale-server-1".to_string()
        ]
    );
}

#[test]
fn stop_all_continues_past_failures() {
    let dir = TempDir::new().unwrap();
    let mut mux = MockSessionMux::new();
    mux.expect_has_session().return_const(true);
    mux.expect_send_keys().returning(|_, _| Ok(()));
    mux.expect_kill_session().returning(|name| {
        if name == "hytale-server-2" {
            Err(MuxError::CommandFailed("tmux kill-session failed".into()))
        } else {
            Ok(())
        }
    });

    let sup = ProcessSupervisor::new(Box::new(mux), layout(dir.path()), runtime(dir.path()))
        .with_grace(Duration::ZERO);
    let report = sup.stop_all(3);
    assert_eq!(report.stopped, vec![ord(1), ord(3)]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, ord(2));
    assert!(!report.is_clean());
}

#[test]
fn start_all_propagates_the_first_failure() {
    let dir = TempDir::new().unwrap();
    let (mux, sup) = fleet(dir.path(), 2);
    // Instance 3 has no directory
    let err = sup.start_all(3, &BackupPolicy::default(), None).unwrap_err();
    assert!(matches!(err, FleetError::InvalidRequest(_)));
    assert_eq!(mux.names(), vec!["hytale-server-1", "hytale-server-2"]);

    // Running instances are skipped on a second pass
    let started = sup.start_all(2, &BackupPolicy::default(), None).unwrap();
    assert!(started.is_empty());
}

#[test]
fn status_and_logs() {
    let dir = TempDir::new().unwrap();
    let (_mux, sup) = fleet(dir.path(), 2);
    sup.start(ord(2), &BackupPolicy::default(), None).unwrap();

    let status = sup.status(2);
    assert_eq!(status[0].state, RunState::Stopped);
    assert_eq!(status[1].state, RunState::Running);
    assert_eq!(status[1].port, 5521);
    assert_eq!(status[1].session, "hytale-server-2");

    let logs = sup.logs(ord(2), 50).unwrap();
    assert!(logs.contains("--bind 0.0.0.0:5521"));
    assert!(matches!(sup.logs(ord(1), 50), Err(FleetError::SessionMissing(1))));
}

#[test]
fn restart_replaces_the_session() {
    let dir = TempDir::new().unwrap();
    let (mux, sup) = fleet(dir.path(), 1);
    sup.start(ord(1), &BackupPolicy::default(), None).unwrap();
    sup.restart(ord(1), &BackupPolicy::default(), Some(&tokens())).unwrap();
    let session = mux.session("hytale-server-1").unwrap();
    assert!(session.command.iter().any(|a| a == "--session-token"));
    assert!(session.typed.is_empty());
}
