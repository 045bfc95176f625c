use std::process::Command;

fn main() {
    let git_hash = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .filter(|x| x.status.success())
        .and_then(|x| String::from_utf8(x.stdout).ok())
        .map_or_else(|| "unknown".to_string(), |x| x.trim().to_string());

    println!("cargo:rustc-env=GIT_HASH={git_hash}");
}
