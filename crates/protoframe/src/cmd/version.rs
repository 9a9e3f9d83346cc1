use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("protoframe {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: protoframe");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target: {}", option_env!("PROTOFRAME_BUILD_TARGET").unwrap_or("unknown"));
    println!("profile: {}", option_env!("PROTOFRAME_BUILD_PROFILE").unwrap_or("unknown"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("rustc: {}", option_env!("RUSTC_VERSION").unwrap_or("unknown"));
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!("framing: NONE, DELIMITER, TIMEOUT, PREFIX_LENGTH, SCRIPT");
    println!("checksums: MOD256, XOR, LRC, CRC16_MODBUS, CRC16_CCITT");

    Ok(SUCCESS)
}
