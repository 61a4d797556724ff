// 判定当前特化进程是否为目标应用
use crate::config::ModuleConfig;

// 去掉多用户偏移：uid = user_id * per_user_range + app_id
pub fn to_app_id(uid: i32, per_user_range: i32) -> i32 {
    if per_user_range <= 0 {
        return uid;
    }
    uid.rem_euclid(per_user_range)
}

// nice name 中 ':' 之后为子进程后缀，如 com.android.chrome:sandboxed_process0
pub fn base_process_name(nice_name: &str) -> &str {
    match nice_name.split_once(':') {
        Some((base, _)) => base,
        None => nice_name,
    }
}

// companion 报告的 uid 与当前 app_id 一致即为目标；
// 否则 isolated 进程只能靠进程名识别（其 uid 不属于目标包）
pub fn is_target_process(
    config: &ModuleConfig,
    nice_name: &str,
    uid: i32,
    target_uid: Option<u32>,
) -> bool {
    let app_id = to_app_id(uid, config.per_user_range);
    if let Some(target_uid) = target_uid
        && target_uid > 0
        && i64::from(app_id) == i64::from(target_uid)
    {
        return true;
    }
    config.isolated_app_ids.contains(&app_id) && base_process_name(nice_name) == config.target_package
}

#[cfg(test)]
mod tests {
    use super::{base_process_name, is_target_process, to_app_id};
    use crate::config::ModuleConfig;

    #[test]
    fn app_id_strips_user_offset() {
        assert_eq!(to_app_id(10042, 100_000), 10042);
        assert_eq!(to_app_id(1_010_042, 100_000), 10042);
        assert_eq!(to_app_id(1000, 100_000), 1000);
        assert_eq!(to_app_id(1234, 0), 1234);
    }

    #[test]
    fn base_name_drops_sub_process_suffix() {
        assert_eq!(base_process_name("com.android.chrome:sandboxed_process0"), "com.android.chrome");
        assert_eq!(base_process_name("com.android.chrome"), "com.android.chrome");
        assert_eq!(base_process_name(""), "");
    }

    #[test]
    fn uid_match_in_secondary_user() {
        let config = ModuleConfig::default();
        assert!(is_target_process(&config, "com.android.chrome", 1_010_042, Some(10042)));
        assert!(!is_target_process(&config, "com.android.chrome", 1_010_043, Some(10042)));
    }

    #[test]
    fn unknown_uid_never_matches_regular_apps() {
        let config = ModuleConfig::default();
        assert!(!is_target_process(&config, "com.android.chrome", 10042, None));
        assert!(!is_target_process(&config, "com.android.chrome", 0, Some(0)));
    }

    #[test]
    fn isolated_process_matches_by_name() {
        let config = ModuleConfig::default();
        assert!(is_target_process(
            &config,
            "com.android.chrome:sandboxed_process0",
            99_003,
            Some(10042)
        ));
        assert!(is_target_process(&config, "com.android.chrome", 1_090_001, None));
        assert!(!is_target_process(&config, "org.example.browser:sandboxed", 99_003, Some(10042)));
        assert!(!is_target_process(&config, "com.android.chrome", 89_999, None));
    }
}
