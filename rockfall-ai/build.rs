//! Stamps the binary with the commit it was built from
//!
//! Exports `ROCKFALL_BUILD` as `<commit>-<profile>`, e.g. `3f9c21ab-release`
//! or `3f9c21ab-dirty-debug`. Outside a git checkout the commit reads
//! `unknown`. Shown by `rockfall-ai --version` and the startup log line.

use std::process::Command;

fn main() {
    let commit = Command::new("git")
        .args(["describe", "--always", "--dirty", "--abbrev=8"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_owned());
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_owned());

    println!("cargo:rustc-env=ROCKFALL_BUILD={}-{}", commit, profile);
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=../.git/HEAD");
    println!("cargo:rerun-if-changed=../.git/index");
}
