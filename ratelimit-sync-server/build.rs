use std::process::Command;

fn main() {
    let git_hash = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|x| String::from_utf8(x.stdout).ok())
        .and_then(|hash| hash.get(..8).map(str::to_owned));

    let dirty = Command::new("git")
        .args(["diff", "--stat"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| !output.stdout.is_empty());

    let git_hash = git_hash.unwrap_or_else(|| "unknown".to_owned());
    if dirty == Some(true) && git_hash != "unknown" {
        println!("cargo:rustc-env=RATELIMIT_SYNC_GIT_HASH={git_hash}-dirty");
    } else {
        println!("cargo:rustc-env=RATELIMIT_SYNC_GIT_HASH={git_hash}");
    }

    if let Ok(profile) = std::env::var("PROFILE") {
        println!("cargo:rustc-env=RATELIMIT_SYNC_PROFILE={profile}");
    }
}
