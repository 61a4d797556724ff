const VERSION_STR: &str = env!("CARGO_PKG_VERSION");

#[cfg(target_arch = "aarch64")]
const VERSION_ARCH: &str = "arm64-v8a";
#[cfg(target_arch = "arm")]
const VERSION_ARCH: &str = "armeabi-v7a";
#[cfg(target_arch = "x86_64")]
const VERSION_ARCH: &str = "x86_64";
#[cfg(target_arch = "x86")]
const VERSION_ARCH: &str = "x86";
#[cfg(not(any(
    target_arch = "aarch64",
    target_arch = "arm",
    target_arch = "x86_64",
    target_arch = "x86"
)))]
const VERSION_ARCH: &str = "unknown";

pub fn version_str() -> &'static str {
    VERSION_STR
}

// 返回包含模块名和 ABI 的完整版本字符串，on_load 时输出
pub fn version_str_full() -> String {
    format!("zygisk_hosts {} ({})", version_str(), VERSION_ARCH)
}
