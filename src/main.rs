use spacedef::render::TextRenderer;
use spacedef::{decode_space, SpaceDef};
use std::env;
use std::fs;
use std::io::{self, Read};
use std::process;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() {
    init_logging();
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <tuple.msgpack | -> [options]", args[0]);
        eprintln!();
        eprintln!("Decode a MessagePack _space tuple and describe the space definition.");
        eprintln!();
        eprintln!("Options:");
        eprintln!("  -o, --output <file>   Output file (default: stdout)");
        eprintln!("      --dup             Describe a duplicate of the decoded definition");
        eprintln!();
        eprintln!("Set RUST_LOG (e.g. RUST_LOG=debug) for decoder diagnostics.");
        process::exit(1);
    }

    let input_path = &args[1];
    let mut output_path: Option<String> = None;
    let mut dup = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "-o" | "--output" => {
                i += 1;
                if i < args.len() {
                    output_path = Some(args[i].clone());
                }
            }
            "--dup" => dup = true,
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let input = if input_path == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf).map(|_| buf)
    } else {
        fs::read(input_path)
    };
    let input = match input {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Failed to read {}: {}", input_path, e);
            process::exit(1);
        }
    };

    let def = match decode_space(&input) {
        Ok(def) => def,
        Err(e) => {
            eprintln!("Decode error: {}", e);
            process::exit(1);
        }
    };

    let def: SpaceDef = if dup {
        match def.dup() {
            Ok(copy) => copy,
            Err(e) => {
                eprintln!("Duplicate error: {}", e);
                process::exit(1);
            }
        }
    } else {
        def
    };

    let text = TextRenderer::default().render(&def);

    match output_path {
        Some(path) => {
            if let Err(e) = fs::write(&path, &text) {
                eprintln!("Failed to write {}: {}", path, e);
                process::exit(1);
            }
        }
        None => print!("{}", text),
    }
}
