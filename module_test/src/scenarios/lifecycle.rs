use std::fs;

use zygisk_hosts::redirect::{self, ORIG_OPEN};
use zygisk_hosts::{
    AppIdentity, Companion, CompanionConfig, HostsModule, ModuleConfig, ModuleLifecycle,
    ModuleOption, SpecializeOutcome,
};

use crate::test_ctx::{
    FixedOwner, LIBC_SUFFIX, RecordingHost, TARGET_PACKAGE, cstring, env_usize, read_via_open_hook,
    spawn_companion, work_dir,
};

const TARGET_APP_ID: u32 = 10_123;
const SOURCE_TEXT: &str = "127.0.0.1 localhost\n";
const REPLACEMENT_TEXT: &str = "0.0.0.0 ads.example.com\n";

fn module_with(host: RecordingHost) -> HostsModule<RecordingHost> {
    let dir = work_dir();
    let config = ModuleConfig {
        target_package: TARGET_PACKAGE.to_string(),
        hosts_source: cstring(&dir.join("hosts")),
        hosts_replacement: cstring(&dir.join("hosts.replacement")),
        libc_suffix: LIBC_SUFFIX.to_string(),
        debug: true,
        ..ModuleConfig::default()
    };
    let mut module = HostsModule::new(host, config);
    module.on_load();
    module
}

fn target_companion(name: &str) -> RecordingHost {
    let socket = spawn_companion(
        name,
        Companion::with_lookup(
            CompanionConfig {
                data_root: work_dir(),
                target_package: TARGET_PACKAGE.to_string(),
            },
            FixedOwner(TARGET_APP_ID),
        ),
    );
    RecordingHost::new(Some(socket))
}

pub fn scenario_target_redirects_open() {
    let dir = work_dir();
    let source = dir.join("hosts");
    let replacement = dir.join("hosts.replacement");
    fs::write(&source, SOURCE_TEXT).expect("write source hosts failed");
    fs::write(&replacement, REPLACEMENT_TEXT).expect("write replacement hosts failed");

    let mut module = module_with(target_companion("lifecycle_target"));
    // 第 10 个用户下的同一应用
    module.pre_app_specialize(&AppIdentity {
        nice_name: TARGET_PACKAGE.to_string(),
        uid: 1_000_000 + TARGET_APP_ID as i32,
    });
    assert_eq!(module.outcome(), SpecializeOutcome::Hooked);
    {
        let registrations = module.host().registrations.borrow();
        assert_eq!(registrations.len(), 1);
        assert_eq!(registrations[0].symbol.as_c_str(), c"open");
        assert_eq!(registrations[0].new_func, redirect::replacement_ptr() as usize);
    }
    assert_eq!(module.host().commits.get(), 1);
    assert!(ORIG_OPEN.is_set(), "original open not written back");
    assert_eq!(
        redirect::active_rule().map(|rule| rule.source.clone()),
        Some(cstring(&source))
    );

    assert_eq!(read_via_open_hook(&source), REPLACEMENT_TEXT);
    assert_eq!(read_via_open_hook(&replacement), REPLACEMENT_TEXT);

    module.post_app_specialize();
    assert!(!module.unload_requested());
    assert!(module.host().options.borrow().is_empty());

    assert!(module.restore(), "restore failed");
    assert!(!ORIG_OPEN.is_set());
    assert!(module.hooks().is_pristine());

    // 替换文件缺失时透传原路径
    fs::remove_file(&replacement).expect("remove replacement failed");
    assert_eq!(read_via_open_hook(&source), SOURCE_TEXT);
}

pub fn scenario_other_app_unloads() {
    let mut module = module_with(target_companion("lifecycle_other"));
    module.pre_app_specialize(&AppIdentity {
        nice_name: "org.example.other".to_string(),
        uid: 10_777,
    });
    assert_eq!(module.outcome(), SpecializeOutcome::NotTarget);
    assert!(module.host().registrations.borrow().is_empty());
    assert_eq!(module.host().commits.get(), 0);

    module.post_app_specialize();
    assert!(module.unload_requested());
    assert_eq!(
        module.host().options.borrow().as_slice(),
        &[ModuleOption::DlcloseModuleLibrary]
    );
}

pub fn scenario_isolated_without_companion() {
    let mut module = module_with(RecordingHost::new(None));
    module.pre_app_specialize(&AppIdentity {
        nice_name: format!("{TARGET_PACKAGE}:sandboxed_process3"),
        uid: 99_003,
    });
    assert_eq!(module.outcome(), SpecializeOutcome::Hooked);
    module.post_app_specialize();
    assert!(!module.unload_requested());
    assert!(module.restore());
    assert!(!ORIG_OPEN.is_set());
}

pub fn scenario_hook_unhook_churn() {
    let rounds = env_usize("MODULE_TEST_CHURN_ROUNDS", 200);
    for round in 0..rounds {
        let mut module = module_with(RecordingHost::new(None));
        module.pre_app_specialize(&AppIdentity {
            nice_name: format!("{TARGET_PACKAGE}:privileged_process{round}"),
            uid: 90_000 + (round % 10_000) as i32,
        });
        assert_eq!(module.outcome(), SpecializeOutcome::Hooked, "round {round}");
        assert!(module.restore(), "restore failed in round {round}");
        assert!(!ORIG_OPEN.is_set());
    }
}
