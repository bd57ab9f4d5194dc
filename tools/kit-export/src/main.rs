//! kit-export - Kit asset conditioning tool
//!
//! Converts raw assets (glTF, PNG/JPG/HDR, TTF, GLSL) into Kit `.asset`
//! containers (meshes, physics meshes, skeletons, animations, textures,
//! fonts, materials, shader modules).

use std::process::ExitCode;

use kit_export::commands;

const EXIT_OK: u8 = 0;
const EXIT_UNKNOWN_COMMAND: u8 = 2;
const EXIT_BAD_ARG_COUNT: u8 = 3;
const EXIT_COMMAND_FAILED: u8 = 4;

fn print_usage() {
    eprintln!("usage: kit-export <command> [args]");
    eprintln!("commands:");
    for command in commands::COMMANDS {
        eprintln!("  {}", command.usage);
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(name) = args.first() else {
        print_usage();
        return ExitCode::from(EXIT_UNKNOWN_COMMAND);
    };

    let Some(command) = commands::find(name) else {
        tracing::error!("Unknown command {:?}", name);
        print_usage();
        return ExitCode::from(EXIT_UNKNOWN_COMMAND);
    };

    let command_args = &args[1..];
    if command_args.len() != command.required_args {
        tracing::error!(
            "Command {} expects {} argument(s), got {}",
            command.name,
            command.required_args,
            command_args.len()
        );
        eprintln!("usage: kit-export {}", command.usage);
        return ExitCode::from(EXIT_BAD_ARG_COUNT);
    }

    match (command.run)(command_args) {
        Ok(()) => ExitCode::from(EXIT_OK),
        Err(err) => {
            tracing::error!("{} failed: {:#}", command.name, err);
            ExitCode::from(EXIT_COMMAND_FAILED)
        }
    }
}
