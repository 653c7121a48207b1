use serde::Serialize;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct VersionInfo {
    name: &'static str,
    version: &'static str,
    target: &'static str,
    profile: &'static str,
    target_os: &'static str,
    target_arch: &'static str,
    features: Features,
}

#[derive(Serialize)]
struct Features {
    #[serde(rename = "async")]
    async_codec: bool,
    pty: bool,
    cli: bool,
}

impl VersionInfo {
    fn current() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            target: option_env!("SLIPLINK_BUILD_TARGET").unwrap_or("unknown"),
            profile: option_env!("SLIPLINK_BUILD_PROFILE").unwrap_or("unknown"),
            target_os: std::env::consts::OS,
            target_arch: std::env::consts::ARCH,
            features: Features {
                async_codec: cfg!(feature = "async"),
                pty: cfg!(target_os = "linux"),
                cli: true,
            },
        }
    }
}

pub fn run(args: VersionArgs, format: OutputFormat) -> CliResult<i32> {
    let info = VersionInfo::current();

    if let OutputFormat::Json = format {
        if args.extended {
            print_json(&info);
        } else {
            print_json(&serde_json::json!({ "name": info.name, "version": info.version }));
        }
        return Ok(SUCCESS);
    }

    if !args.extended {
        println!("{} {}", info.name, info.version);
        return Ok(SUCCESS);
    }

    println!("name: {}", info.name);
    println!("version: {}", info.version);
    println!("target: {}", info.target);
    println!("profile: {}", info.profile);
    println!("target_os: {}", info.target_os);
    println!("target_arch: {}", info.target_arch);
    println!(
        "features: async={}, pty={}, cli={}",
        info.features.async_codec, info.features.pty, info.features.cli
    );

    Ok(SUCCESS)
}
