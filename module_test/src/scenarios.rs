mod companion;
mod lifecycle;
mod maps;

use crate::test_ctx::env_flag;

pub fn run_all() {
    run("maps-live-libc", maps::scenario_live_libc_identity);
    run("maps-rescan-stable", maps::scenario_rescan_is_stable);
    run("companion-serve-fs-owner", companion::scenario_serve_reports_fs_owner);
    run(
        "companion-unknown-request",
        companion::scenario_unknown_request_is_dropped,
    );
    run(
        "companion-concurrent-clients",
        companion::scenario_concurrent_clients,
    );
    // open 重定向规则进程内只安装一次，命中目标的用例必须最先执行
    run("lifecycle-target-redirect", lifecycle::scenario_target_redirects_open);
    run("lifecycle-other-unloads", lifecycle::scenario_other_app_unloads);
    run(
        "lifecycle-isolated-no-companion",
        lifecycle::scenario_isolated_without_companion,
    );
    if env_flag("MODULE_TEST_CHURN") {
        run("lifecycle-churn", lifecycle::scenario_hook_unhook_churn);
    }
}

fn run(name: &str, scenario: fn()) {
    println!("scenario: {name}");
    scenario();
}
