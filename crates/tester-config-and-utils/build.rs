fn main() {
    // Tell cargo to recompile when these compile-time env vars change.
    // Without this, option_env!() values get cached and won't update.
    println!("cargo:rerun-if-env-changed=APP_TESTER_ISSUER_URL");
    println!("cargo:rerun-if-env-changed=APP_TESTER_CLIENT_ID");
    println!("cargo:rerun-if-env-changed=APP_TESTER_API_SCOPE");
    println!("cargo:rerun-if-env-changed=APP_TESTER_RELEASES_ENDPOINT");
}
