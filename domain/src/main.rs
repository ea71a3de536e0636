use std::env;
use std::process;

use domain::adapters::memory_repo::InMemoryStore;
use domain::code::Sha256CodeDeriver;
use domain::service::MappingGateway;
use domain::{CoreError, SystemClock};

fn print_usage() {
    eprintln!(
        "{}\n\nUsage:\n  domain create <url>\n  domain resolve <code>\n  domain code <url>\n\nNotes:\n  - This demo CLI uses an in-memory store; data is not persisted across runs.\n  - `resolve` therefore only succeeds for a code created in the same invocation,\n    e.g. `domain create <url> --resolve`.",
        domain::about()
    );
}

fn run() -> Result<(), String> {
    let mut args = env::args().skip(1); // skip program name

    let Some(cmd) = args.next() else {
        print_usage();
        return Ok(());
    };

    let svc = MappingGateway::new(
        InMemoryStore::new(),
        Sha256CodeDeriver::default(),
        SystemClock,
    );

    match cmd.as_str() {
        "create" => {
            let Some(url) = args.next() else {
                return Err("missing <url> for create".into());
            };
            let mut resolve_after = false;
            for flag in args {
                match flag.as_str() {
                    "--resolve" => resolve_after = true,
                    unk => return Err(format!("unknown argument: {}", unk)),
                }
            }

            let out = svc
                .create_mapping(&url)
                .map_err(|e| format!("create failed: {}", e))?;
            let status = if out.is_created() { "created" } else { "exists" };
            println!("{}: {} -> {}", status, out.short_code(), out.target_url());

            if resolve_after {
                let target = svc
                    .resolve(out.short_code().as_str())
                    .map_err(|e| format!("resolve failed: {}", e))?;
                let clicks = svc
                    .get(&target.short_code)
                    .map_err(|e| format!("lookup failed: {}", e))?
                    .map(|m| m.clicks)
                    .unwrap_or(0);
                println!("resolved: {} (clicks: {})", target.location, clicks);
            }
            Ok(())
        }
        "resolve" => {
            let Some(code) = args.next() else {
                return Err("missing <code> for resolve".into());
            };
            match svc.resolve(&code) {
                Ok(target) => {
                    println!("{}", target.location);
                    Ok(())
                }
                Err(CoreError::NotFound) => Err("not found".into()),
                Err(e) => Err(format!("resolve failed: {}", e)),
            }
        }
        "code" => {
            let Some(url) = args.next() else {
                return Err("missing <url> for code".into());
            };
            println!("{}", svc.derive(&url));
            Ok(())
        }
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn main() {
    if let Err(msg) = run() {
        eprintln!("error: {}", msg);
        process::exit(1);
    }
}
