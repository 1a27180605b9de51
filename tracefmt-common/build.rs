use std::env;

// Syscall numbers follow the target, not the host running this script.
fn main() {
    println!("cargo::rerun-if-changed=build.rs");
    println!("cargo::rustc-check-cfg=cfg(aarch64)");
    println!("cargo::rustc-check-cfg=cfg(x86_64)");

    let arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();
    match arch.as_str() {
        "aarch64" | "x86_64" => println!("cargo::rustc-cfg={arch}"),
        other => panic!("syscall numbers are only known for aarch64 and x86_64, not {other:?}"),
    }
}
