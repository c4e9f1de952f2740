//! Command-line entry point for the headless skirmish harness. Prints the
//! result as JSON so sweeps can be driven from scripts.

use stonereach_core::{run_batch_skirmish, run_skirmish, SkirmishConfig};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stonereach_core=info".into()),
        )
        .init();

    let mut config = SkirmishConfig::default();
    let mut games = 1u32;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        let mut take = |name: &str| -> String {
            args.next().unwrap_or_else(|| {
                eprintln!("missing value for {name}");
                std::process::exit(2);
            })
        };
        match arg.as_str() {
            "--seed" => config.seed = parse(&take("--seed")),
            "--max-cycles" => config.max_cycles = parse(&take("--max-cycles")),
            "--games" => games = parse(&take("--games")),
            "--help" | "-h" => {
                eprintln!("usage: stonereach-skirmish [--seed N] [--max-cycles N] [--games N]");
                return;
            }
            other => {
                eprintln!("unknown argument: {other}");
                std::process::exit(2);
            }
        }
    }

    let json = if games > 1 {
        match run_batch_skirmish(&config, games) {
            Ok(batch) => serde_json::to_string_pretty(&batch),
            Err(error) => fail(&error),
        }
    } else {
        match run_skirmish(&config) {
            Ok(result) => serde_json::to_string_pretty(&result),
            Err(error) => fail(&error),
        }
    };

    match json {
        Ok(json) => println!("{json}"),
        Err(error) => fail(&error),
    }
}

fn fail(error: &dyn std::fmt::Display) -> ! {
    tracing::error!("skirmish failed: {error}");
    std::process::exit(1);
}

fn parse<T: std::str::FromStr>(value: &str) -> T {
    value.parse().unwrap_or_else(|_| {
        eprintln!("invalid numeric argument: {value}");
        std::process::exit(2);
    })
}
