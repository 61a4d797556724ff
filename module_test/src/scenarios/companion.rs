use std::fs;
use std::io::Read;
use std::os::unix::net::UnixStream;
use std::thread;

use zygisk_hosts::companion::{self, CompanionRequest};
use zygisk_hosts::ipc::FramedStreamExt;
use zygisk_hosts::{Companion, CompanionConfig};

use crate::test_ctx::{
    FixedOwner, RecordingHost, TARGET_PACKAGE, env_usize, spawn_companion, work_dir,
};

pub fn scenario_serve_reports_fs_owner() {
    let data_root = work_dir().join("data");
    fs::create_dir_all(data_root.join(TARGET_PACKAGE)).expect("create package dir failed");
    let socket = spawn_companion(
        "companion_fs",
        Companion::new(CompanionConfig {
            data_root,
            target_package: TARGET_PACKAGE.to_string(),
        }),
    );

    let host = RecordingHost::new(Some(socket));
    let uid = companion::query_chrome_uid(&host);
    // root 属主的目录报告 0，按协议视为未知
    let euid = unsafe { libc::geteuid() };
    if euid == 0 {
        assert_eq!(uid, None);
    } else {
        assert_eq!(uid, Some(euid));
    }
}

pub fn scenario_unknown_request_is_dropped() {
    let socket = spawn_companion(
        "companion_unknown",
        Companion::with_lookup(CompanionConfig::default(), FixedOwner(10_123)),
    );
    let mut stream = UnixStream::connect(&socket).expect("connect companion failed");
    stream.write_i32(42).expect("send unknown request failed");
    let mut response = Vec::new();
    stream
        .read_to_end(&mut response)
        .expect("read companion response failed");
    assert!(response.is_empty(), "unknown request got {response:?}");
}

pub fn scenario_concurrent_clients() {
    let socket = spawn_companion(
        "companion_concurrent",
        Companion::with_lookup(CompanionConfig::default(), FixedOwner(10_123)),
    );
    let clients = env_usize("MODULE_TEST_COMPANION_CLIENTS", 16);
    let handles: Vec<_> = (0..clients)
        .map(|_| {
            let socket = socket.clone();
            thread::spawn(move || {
                let mut stream = UnixStream::connect(&socket).expect("connect companion failed");
                stream
                    .write_i32(CompanionRequest::GetChromeUid as i32)
                    .expect("send request failed");
                stream.read_i32()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().expect("client thread panicked"), 10_123);
    }
}
