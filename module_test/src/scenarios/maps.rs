use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use zygisk_hosts::hook;
use zygisk_hosts::maps;

use crate::test_ctx::LIBC_SUFFIX;

pub fn scenario_live_libc_identity() {
    let mappings = maps::scan_maps();
    assert!(!mappings.is_empty(), "no mappings parsed from live maps");
    assert!(
        mappings.iter().any(|mapping| mapping.is_executable()),
        "live maps has no executable mapping"
    );

    let library = hook::locate_library(LIBC_SUFFIX).expect("libc not mapped");
    let mapping = mappings
        .iter()
        .find(|mapping| mapping.path.as_bytes().ends_with(LIBC_SUFFIX.as_bytes()))
        .expect("libc mapping missing");
    assert_eq!(library.inode, mapping.inode);
    assert_eq!(library.dev, mapping.dev);

    // overlay 挂载下 st_dev 可能与映射设备号不同，只比较 inode
    let metadata = fs::metadata(&mapping.path).expect("stat libc failed");
    assert_eq!(
        metadata.ino() as libc::ino_t,
        library.inode,
        "libc inode mismatch for {}",
        Path::new(&mapping.path).display()
    );
    println!(
        "libc {} dev={}:{} inode={}",
        Path::new(&mapping.path).display(),
        libc::major(library.dev),
        libc::minor(library.dev),
        library.inode
    );
}

pub fn scenario_rescan_is_stable() {
    let first = hook::locate_library(LIBC_SUFFIX).expect("libc not mapped");
    for _ in 0..32 {
        let again = hook::locate_library(LIBC_SUFFIX).expect("libc vanished");
        assert_eq!(first, again, "libc identity changed between scans");
    }
}
