fn main() {
    // Surfaced by `protoframe version --extended`.
    for (cargo_var, env_key) in [
        ("TARGET", "PROTOFRAME_BUILD_TARGET"),
        ("PROFILE", "PROTOFRAME_BUILD_PROFILE"),
    ] {
        println!("cargo:rerun-if-env-changed={cargo_var}");
        if let Ok(value) = std::env::var(cargo_var) {
            println!("cargo:rustc-env={env_key}={value}");
        }
    }
}
