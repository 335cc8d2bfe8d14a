use std::process::Command;

/// Short commit id from `GIT_SHA` (CI) or the local checkout
fn commit() -> Option<String> {
    std::env::var("GIT_SHA")
        .ok()
        .or_else(|| {
            let out = Command::new("git")
                .args(["rev-parse", "--short", "HEAD"])
                .output()
                .ok()?;
            out.status
                .success()
                .then(|| String::from_utf8_lossy(&out.stdout).trim().to_string())
        })
        .filter(|s| !s.is_empty())
}

fn main() {
    let mut version = env!("CARGO_PKG_VERSION").to_string();
    if std::env::var("TESLAGRAM_NIGHTLY").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true")) {
        version.push_str("-nightly");
        if let Some(sha) = commit() {
            version = format!("{}+{}", version, sha);
        }
    }
    println!("cargo:rustc-env=APP_VERSION={}", version);

    for var in ["TESLAGRAM_NIGHTLY", "GIT_SHA"] {
        println!("cargo:rerun-if-env-changed={}", var);
    }
    println!("cargo:rerun-if-changed=.git/HEAD");
}
